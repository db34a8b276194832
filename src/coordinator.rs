//! Run lifecycle: start both pools, wait for producers, wait for drain, then cancel consumers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::errors::RunError;
use crate::log_dev;
use crate::shared_queue::SharedQueue;
use crate::trace::TraceSink;
use crate::types::WorkItem;
use crate::worker::{Consumer, ConsumerHandle, Producer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Producing,
    Draining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "STARTING",
            Phase::Producing => "PRODUCING",
            Phase::Draining => "DRAINING",
            Phase::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Totals observed once the queue has drained.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub produced: usize,
    pub consumed: usize,
    pub acknowledged: usize,
    pub elapsed: Duration,
}

impl RunReport {
    /// Every enqueued item was dequeued once and acknowledged once.
    pub fn is_conserved(&self) -> bool {
        self.produced == self.consumed && self.consumed == self.acknowledged
    }
}

/// Drives one closed workload from STARTING to DONE.
pub struct Coordinator {
    config: RunConfig,
    sink: Arc<dyn TraceSink>,
    phase: Phase,
}

impl Coordinator {
    pub fn new(config: RunConfig, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            config,
            sink,
            phase: Phase::Starting,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        log_dev!("[COORD] phase={phase}");
        self.phase = phase;
    }

    /// Run the workload to completion.
    ///
    /// Blocks forever if a producer stalls without panicking: drain has no timeout.
    pub fn run(&mut self) -> Result<RunReport, RunError> {
        self.config.validate()?;
        self.enter(Phase::Starting);

        let queue = Arc::new(SharedQueue::new());
        let start = Instant::now();

        let mut consumers = Vec::with_capacity(self.config.consumers);
        for id in 0..self.config.consumers {
            let consumer = Consumer::new(
                id,
                self.config.delay,
                Arc::clone(&queue),
                Arc::clone(&self.sink),
            );
            let name = consumer.name.clone();
            match consumer.spawn() {
                Ok(handle) => consumers.push(handle),
                Err(source) => {
                    shutdown_consumers(&queue, consumers);
                    return Err(RunError::WorkerSpawn { name, source });
                }
            }
        }

        let mut producers = Vec::with_capacity(self.config.producers);
        for id in 0..self.config.producers {
            let producer = Producer::new(
                id,
                self.config.items_per_producer,
                self.config.delay,
                Arc::clone(&queue),
                Arc::clone(&self.sink),
            );
            let name = producer.name.clone();
            match producer.spawn() {
                Ok(handle) => producers.push((name, handle)),
                Err(source) => {
                    shutdown_consumers(&queue, consumers);
                    return Err(RunError::WorkerSpawn { name, source });
                }
            }
        }

        self.enter(Phase::Producing);
        let mut panicked = None;
        for (name, handle) in producers {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(name);
            }
        }
        if let Some(name) = panicked {
            tracing::error!(worker = %name, "producer panicked; abandoning run");
            shutdown_consumers(&queue, consumers);
            return Err(RunError::ProducerPanicked(name));
        }
        log_dev!(
            "[QUEUE] producers joined queued={} unacknowledged={}",
            queue.len(),
            queue.unacknowledged()
        );

        self.enter(Phase::Draining);
        queue.await_drain();

        self.enter(Phase::Done);
        let stats = queue.stats();
        let report = RunReport {
            produced: stats.enqueued,
            consumed: stats.dequeued,
            acknowledged: stats.acknowledged,
            elapsed: start.elapsed(),
        };
        self.sink.complete(&report);
        shutdown_consumers(&queue, consumers);
        Ok(report)
    }
}

/// Cancel every consumer and release the ones parked in `dequeue`; never joins.
fn shutdown_consumers(queue: &SharedQueue<WorkItem>, consumers: Vec<ConsumerHandle>) {
    for handle in consumers {
        log_dev!("[COORD] cancelling {}", handle.name);
        drop(handle.cancel());
    }
    queue.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use crate::errors::ConfigError;
    use crate::trace::{Action, MemorySink};
    use tracing_test::traced_test;

    fn config(producers: usize, consumers: usize, items: usize) -> RunConfig {
        RunConfig {
            producers,
            consumers,
            items_per_producer: items,
            delay: DelayRange::none(),
        }
    }

    fn run(config: RunConfig) -> (RunReport, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut coordinator = Coordinator::new(config, sink.clone());
        let report = coordinator.run().expect("run should succeed");
        assert_eq!(coordinator.phase(), Phase::Done);
        (report, sink)
    }

    #[test]
    fn four_producers_five_consumers_drain_forty_items() {
        let (report, sink) = run(config(4, 5, 10));

        assert_eq!(report.produced, 40);
        assert_eq!(report.acknowledged, 40);
        assert!(report.is_conserved());
        assert_eq!(sink.completions().len(), 1);
        assert_eq!(sink.completions()[0], report);
        // Same multiset of values out as went in.
        assert_eq!(sink.values(Action::Produced), sink.values(Action::Consumed));
        assert_eq!(sink.values(Action::Consumed).len(), 40);
    }

    #[test]
    fn single_item_is_produced_before_consumed() {
        let (report, sink) = run(config(1, 1, 1));
        assert_eq!(report.acknowledged, 1);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, Action::Produced);
        assert_eq!(events[0].worker, "producer-0");
        assert_eq!(events[1].action, Action::Consumed);
        assert_eq!(events[1].worker, "consumer-0");
        assert_eq!(events[0].item, events[1].item);
    }

    #[test]
    fn single_consumer_serializes_many_producers() {
        let (report, sink) = run(config(8, 1, 25));
        assert_eq!(report.produced, 200);
        assert!(report.is_conserved());
        let consumed = sink.events();
        assert!(
            consumed
                .iter()
                .filter(|e| e.action == Action::Consumed)
                .all(|e| e.worker == "consumer-0")
        );
        assert_eq!(sink.values(Action::Produced), sink.values(Action::Consumed));
    }

    #[test]
    fn random_delays_still_conserve_items() {
        let mut config = config(3, 2, 4);
        config.delay = DelayRange::new(0.0, 0.005).expect("valid range");
        let (report, sink) = run(config);
        assert_eq!(report.acknowledged, 12);
        assert!(report.is_conserved());
        assert_eq!(sink.events().len(), 24);
    }

    #[test]
    fn invalid_config_starts_nothing() {
        let sink = Arc::new(MemorySink::new());
        let mut coordinator = Coordinator::new(config(2, 0, 3), sink.clone());
        let err = coordinator.run().expect_err("zero consumers must be rejected");
        assert!(matches!(err, RunError::Config(ConfigError::ZeroConsumers)));
        assert_eq!(coordinator.phase(), Phase::Starting);
        assert!(sink.events().is_empty());
        assert!(sink.completions().is_empty());
    }

    #[test]
    #[traced_test]
    fn phases_are_logged_in_order() {
        run(config(2, 2, 2));
        assert!(logs_contain("phase=STARTING"));
        assert!(logs_contain("phase=PRODUCING"));
        assert!(logs_contain("phase=DRAINING"));
        assert!(logs_contain("phase=DONE"));
    }

    #[test]
    fn phase_names_render_upper_case() {
        assert_eq!(Phase::Draining.to_string(), "DRAINING");
        assert_eq!(Phase::Done.to_string(), "DONE");
    }
}
