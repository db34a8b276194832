//! Shared identifiers and the work item model used across the system.

use std::fmt;

/// Smallest value a work item may carry.
pub const WORK_ITEM_MIN: u8 = 1;
/// Largest value a work item may carry.
pub const WORK_ITEM_MAX: u8 = 50;

/// Unique identifier for a worker thread within its role.
pub type WorkerId = usize;

/// Opaque integer payload passed from producers to consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem(u8);

impl WorkItem {
    /// Wrap a value; returns `None` when it falls outside [1, 50].
    #[cfg(test)]
    pub fn new(value: u8) -> Option<Self> {
        (WORK_ITEM_MIN..=WORK_ITEM_MAX)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Draw a uniformly random item.
    pub fn random<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(WORK_ITEM_MIN..=WORK_ITEM_MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the queue a worker sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    /// Thread name for the `id`-th worker of this role.
    pub fn worker_name(self, id: WorkerId) -> String {
        match self {
            Role::Producer => format!("producer-{id}"),
            Role::Consumer => format!("consumer-{id}"),
        }
    }
}
