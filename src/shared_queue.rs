//! Thread-safe FIFO work queue with acknowledgement tracking and a drain barrier.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::errors::QueueError;

/// Monotone totals, used to check conservation at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: usize,
    pub dequeued: usize,
    pub acknowledged: usize,
}

/// Unbounded FIFO shared by every producer and consumer.
///
/// Each enqueued item counts as unacknowledged until a consumer calls
/// [`SharedQueue::acknowledge`] for it; [`SharedQueue::await_drain`] blocks until
/// that count is back to zero.
pub struct SharedQueue<T> {
    inner: Mutex<QueueState<T>>,
    available: Condvar,
    drained: Condvar,
}

struct QueueState<T> {
    items: VecDeque<T>,
    unacknowledged: usize,
    stats: QueueStats,
    closed: bool,
}

impl<T> QueueState<T> {
    /// Items handed to a consumer that have not been acknowledged yet.
    fn in_flight(&self) -> usize {
        self.stats.dequeued - self.stats.acknowledged
    }
}

impl<T> SharedQueue<T> {
    /// Create an empty queue with nothing outstanding.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueState {
                items: VecDeque::new(),
                unacknowledged: 0,
                stats: QueueStats::default(),
                closed: false,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Append to the tail and wake one waiting consumer. Never blocks.
    pub fn enqueue(&self, item: T) {
        let mut guard = self.inner.lock().expect("shared queue mutex poisoned");
        guard.items.push_back(item);
        guard.unacknowledged += 1;
        guard.stats.enqueued += 1;
        self.available.notify_one();
    }

    /// Block until an item is available and take it from the head.
    ///
    /// Returns `None` only once the queue has been closed and emptied.
    pub fn dequeue(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("shared queue mutex poisoned");
        loop {
            if let Some(item) = guard.items.pop_front() {
                guard.stats.dequeued += 1;
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            // Wait releases the lock and re-acquires it before returning.
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Mark one dequeued item as processed; returns the remaining unacknowledged count.
    pub fn acknowledge(&self) -> Result<usize, QueueError> {
        let mut guard = self.inner.lock().expect("shared queue mutex poisoned");
        if guard.in_flight() == 0 {
            return Err(QueueError::NothingToAcknowledge);
        }
        debug_assert!(guard.unacknowledged > 0, "unacknowledged counter underflow");
        guard.unacknowledged -= 1;
        guard.stats.acknowledged += 1;
        if guard.unacknowledged == 0 {
            self.drained.notify_all();
        }
        Ok(guard.unacknowledged)
    }

    /// Block until every enqueued item has been acknowledged.
    pub fn await_drain(&self) {
        let mut guard = self.inner.lock().expect("shared queue mutex poisoned");
        while guard.unacknowledged > 0 {
            guard = self.drained.wait(guard).expect("condvar wait failed");
        }
    }

    /// Release consumers blocked in `dequeue` once no more work will arrive.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("shared queue mutex poisoned");
        guard.closed = true;
        self.available.notify_all();
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("shared queue mutex poisoned");
        guard.items.len()
    }

    pub fn unacknowledged(&self) -> usize {
        let guard = self.inner.lock().expect("shared queue mutex poisoned");
        guard.unacknowledged
    }

    pub fn stats(&self) -> QueueStats {
        let guard = self.inner.lock().expect("shared queue mutex poisoned");
        guard.stats
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
