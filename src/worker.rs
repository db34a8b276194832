//! Producer and consumer loops, plus the cancellation handle for consumers.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::config::DelayRange;
use crate::log_dev;
use crate::shared_queue::SharedQueue;
use crate::trace::{Action, TraceEvent, TraceSink};
use crate::types::{Role, WorkItem, WorkerId};

/// Generates a fixed number of random items and enqueues them.
pub struct Producer {
    pub name: String,
    pub items: usize,
    pub delay: DelayRange,
    pub queue: Arc<SharedQueue<WorkItem>>,
    pub sink: Arc<dyn TraceSink>,
}

impl Producer {
    pub fn new(
        id: WorkerId,
        items: usize,
        delay: DelayRange,
        queue: Arc<SharedQueue<WorkItem>>,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            name: Role::Producer.worker_name(id),
            items,
            delay,
            queue,
            sink,
        }
    }

    pub fn run(self) {
        let mut rng = rand::thread_rng();
        for _ in 0..self.items {
            let pause = self.delay.sample(&mut rng);
            if !pause.is_zero() {
                thread::sleep(pause);
            }
            let item = WorkItem::random(&mut rng);
            // Record first so a trace never shows a consume ahead of its produce.
            self.sink.record(TraceEvent {
                worker: self.name.clone(),
                item,
                action: Action::Produced,
            });
            self.queue.enqueue(item);
        }
        log_dev!("[PRODUCER] {} finished items={}", self.name, self.items);
    }

    /// Start the loop on its own named thread.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || self.run())
    }
}

/// Shared flag a consumer polls between items.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Takes items until cancelled or until the queue closes, acknowledging each one.
pub struct Consumer {
    pub name: String,
    pub delay: DelayRange,
    pub queue: Arc<SharedQueue<WorkItem>>,
    pub sink: Arc<dyn TraceSink>,
    pub token: CancelToken,
}

impl Consumer {
    pub fn new(
        id: WorkerId,
        delay: DelayRange,
        queue: Arc<SharedQueue<WorkItem>>,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            name: Role::Consumer.worker_name(id),
            delay,
            queue,
            sink,
            token: CancelToken::new(),
        }
    }

    /// Returns the number of items this consumer acknowledged.
    pub fn run(self) -> usize {
        let mut rng = rand::thread_rng();
        let mut handled = 0usize;
        while !self.token.is_cancelled() {
            let pause = self.delay.sample(&mut rng);
            if !pause.is_zero() {
                thread::sleep(pause);
            }
            if self.token.is_cancelled() {
                break;
            }
            let Some(item) = self.queue.dequeue() else {
                break;
            };
            self.sink.record(TraceEvent {
                worker: self.name.clone(),
                item,
                action: Action::Consumed,
            });
            if let Err(err) = self.queue.acknowledge() {
                tracing::error!(worker = %self.name, "stopping consumer: {err}");
                break;
            }
            handled += 1;
        }
        log_dev!("[CONSUMER] {} stopped handled={handled}", self.name);
        handled
    }

    /// Start the loop on its own named thread and hand back its cancellation handle.
    pub fn spawn(self) -> io::Result<ConsumerHandle> {
        let name = self.name.clone();
        let token = self.token.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())?;
        Ok(ConsumerHandle {
            name,
            token,
            thread,
        })
    }
}

/// Owner-side handle for a running consumer.
pub struct ConsumerHandle {
    pub name: String,
    token: CancelToken,
    thread: thread::JoinHandle<usize>,
}

impl ConsumerHandle {
    /// Ask the consumer to stop without waiting for it.
    ///
    /// The join handle is returned so callers may detach it by dropping, or join it in tests.
    pub fn cancel(self) -> thread::JoinHandle<usize> {
        self.token.cancel();
        self.thread
    }
}
