//! Single-pass throughput benchmark with optional conservation checks.

use std::sync::Arc;

use crate::config::RunConfig;
use crate::coordinator::{Coordinator, RunReport};
use crate::errors::RunError;
use crate::trace::{Action, MemorySink, NullSink, TraceSink};

pub const CSV_HEADER: &str = "producers,consumers,items_per_producer,total_items,elapsed_ms,throughput_items_per_s,cpu_user_s,cpu_sys_s,conserved";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage, timeval};

    fn seconds(tv: timeval) -> f64 {
        tv.tv_sec as f64 + (tv.tv_usec as f64 / 1_000_000.0)
    }

    // SAFETY: rusage is plain old data; all-zero is a valid bit pattern.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    Some((seconds(usage.ru_utime), seconds(usage.ru_stime)))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Named invariant breaches found by `--validate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    ItemCount,
    ValueMismatch,
    CompletionCount,
    Conservation,
}

impl Violation {
    fn name(self) -> &'static str {
        match self {
            Violation::ItemCount => "item_count",
            Violation::ValueMismatch => "value_mismatch",
            Violation::CompletionCount => "completion_count",
            Violation::Conservation => "conservation",
        }
    }
}

pub struct BenchResult {
    pub config: RunConfig,
    pub report: RunReport,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
    pub violations: Vec<Violation>,
}

impl BenchResult {
    pub fn elapsed_ms(&self) -> f64 {
        self.report.elapsed.as_secs_f64() * 1000.0
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.report.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.report.acknowledged as f64 / secs
        } else {
            0.0
        }
    }

    pub fn csv_row(&self) -> String {
        let cpu_user = self
            .cpu_user_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        let cpu_sys = self
            .cpu_sys_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        format!(
            "{},{},{},{},{:.2},{:.2},{},{},{}",
            self.config.producers,
            self.config.consumers,
            self.config.items_per_producer,
            self.config.total_items(),
            self.elapsed_ms(),
            self.throughput(),
            cpu_user,
            cpu_sys,
            self.report.is_conserved()
        )
    }
}

fn check_trace(config: &RunConfig, report: &RunReport, trace: &MemorySink) -> Vec<Violation> {
    let mut violations = Vec::new();
    let produced = trace.values(Action::Produced);
    let consumed = trace.values(Action::Consumed);
    let expected = config.total_items();
    if produced.len() != expected || consumed.len() != expected || report.acknowledged != expected
    {
        violations.push(Violation::ItemCount);
    }
    if produced != consumed {
        violations.push(Violation::ValueMismatch);
    }
    if trace.completions().len() != 1 {
        violations.push(Violation::CompletionCount);
    }
    if !report.is_conserved() {
        violations.push(Violation::Conservation);
    }
    violations
}

/// Run the workload once and collect timings; with `validate` the trace is captured and checked.
pub fn benchmark_once(config: RunConfig, validate: bool) -> Result<BenchResult, RunError> {
    let trace = validate.then(|| Arc::new(MemorySink::new()));
    let sink: Arc<dyn TraceSink> = match trace.as_ref() {
        Some(trace) => Arc::clone(trace) as Arc<dyn TraceSink>,
        None => Arc::new(NullSink),
    };

    let cpu_start = cpu_times_seconds();
    let report = Coordinator::new(config, sink).run()?;
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    let violations = match trace.as_ref() {
        Some(trace) => check_trace(&config, &report, trace),
        None => Vec::new(),
    };

    Ok(BenchResult {
        config,
        report,
        cpu_user_s,
        cpu_sys_s,
        violations,
    })
}

/// Print the CSV result; returns `false` when validation found a violation.
pub fn run_benchmark(config: RunConfig, validate: bool) -> Result<bool, RunError> {
    let result = benchmark_once(config, validate)?;
    println!("{CSV_HEADER}");
    println!("{}", result.csv_row());
    for violation in &result.violations {
        eprintln!("# violation,{}", violation.name());
    }
    Ok(result.violations.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use std::time::Duration;

    fn config() -> RunConfig {
        RunConfig {
            producers: 3,
            consumers: 2,
            items_per_producer: 20,
            delay: DelayRange::none(),
        }
    }

    #[test]
    fn validated_run_has_no_violations() {
        let result = benchmark_once(config(), true).expect("benchmark run");
        assert!(result.violations.is_empty(), "{:?}", result.violations);
        assert_eq!(result.report.acknowledged, 60);
    }

    #[test]
    fn csv_row_matches_header_columns() {
        let result = benchmark_once(config(), false).expect("benchmark run");
        let row = result.csv_row();
        assert_eq!(row.split(',').count(), CSV_HEADER.split(',').count());
        assert!(row.starts_with("3,2,20,60,"));
        assert!(row.ends_with(",true"));
    }

    #[test]
    fn check_trace_flags_missing_items() {
        let config = config();
        let trace = MemorySink::new();
        let report = RunReport {
            produced: 60,
            consumed: 59,
            acknowledged: 59,
            elapsed: Duration::from_millis(1),
        };
        let violations = check_trace(&config, &report, &trace);
        assert!(violations.contains(&Violation::ItemCount));
        assert!(violations.contains(&Violation::CompletionCount));
        assert!(violations.contains(&Violation::Conservation));
    }

    #[cfg(unix)]
    #[test]
    fn cpu_times_are_available_on_unix() {
        let (user, sys) = cpu_times_seconds().expect("getrusage");
        assert!(user >= 0.0 && sys >= 0.0);
    }
}
