//! Line-oriented trace of produce/consume events plus the completion line.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

use crate::coordinator::RunReport;
use crate::types::WorkItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Produced,
    Consumed,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Produced => f.write_str("produced"),
            Action::Consumed => f.write_str("consumed"),
        }
    }
}

/// One produce or consume event, as seen by the worker that performed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub worker: String,
    pub item: WorkItem,
    pub action: Action,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.worker, self.item, self.action)
    }
}

/// Destination for trace events; shared by every worker of a run.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent);

    /// Called exactly once, after the queue has drained.
    fn complete(&self, report: &RunReport);
}

/// Writes one line per event to stdout.
pub struct StdoutSink;

impl TraceSink for StdoutSink {
    fn record(&self, event: TraceEvent) {
        // Lock so lines from different workers never interleave.
        let mut out = std::io::stdout().lock();
        if writeln!(out, "{event}").is_err() {
            tracing::warn!("failed to write trace line");
        }
    }

    fn complete(&self, report: &RunReport) {
        println!(
            "All items produced and consumed successfully ({} items)",
            report.acknowledged
        );
    }
}

/// Drops every event; used by benchmarks that only want timings.
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _event: TraceEvent) {}

    fn complete(&self, _report: &RunReport) {}
}

/// Keeps every event in arrival order for later inspection.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
    completions: Mutex<Vec<RunReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("trace mutex poisoned").clone()
    }

    pub fn completions(&self) -> Vec<RunReport> {
        self.completions
            .lock()
            .expect("trace mutex poisoned")
            .clone()
    }

    /// Item values seen for one action, sorted so runs can be compared as multisets.
    pub fn values(&self, action: Action) -> Vec<u8> {
        let guard = self.events.lock().expect("trace mutex poisoned");
        let mut values: Vec<u8> = guard
            .iter()
            .filter(|event| event.action == action)
            .map(|event| event.item.value())
            .collect();
        values.sort_unstable();
        values
    }
}

impl TraceSink for MemorySink {
    fn record(&self, event: TraceEvent) {
        self.events
            .lock()
            .expect("trace mutex poisoned")
            .push(event);
    }

    fn complete(&self, report: &RunReport) {
        self.completions
            .lock()
            .expect("trace mutex poisoned")
            .push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(value: u8) -> WorkItem {
        WorkItem::new(value).expect("value in range")
    }

    #[test]
    fn event_renders_as_single_line() {
        let event = TraceEvent {
            worker: "producer-2".to_string(),
            item: item(17),
            action: Action::Produced,
        };
        assert_eq!(event.to_string(), "producer-2 17 produced");
    }

    #[test]
    fn memory_sink_groups_values_by_action() {
        let sink = MemorySink::new();
        for (value, action) in [
            (9, Action::Produced),
            (3, Action::Produced),
            (3, Action::Consumed),
        ] {
            sink.record(TraceEvent {
                worker: "w".to_string(),
                item: item(value),
                action,
            });
        }
        assert_eq!(sink.values(Action::Produced), vec![3, 9]);
        assert_eq!(sink.values(Action::Consumed), vec![3]);
        assert_eq!(sink.events().len(), 3);
    }
}
