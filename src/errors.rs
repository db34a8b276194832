//! Error types for configuration, queue bookkeeping, and whole-run failures.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("producers must be > 0")]
    ZeroProducers,

    #[error("consumers must be > 0")]
    ZeroConsumers,

    #[error("items per producer must be > 0")]
    ZeroItems,

    #[error("invalid delay range [{min}, {max}]: bounds must be non-negative durations with min <= max")]
    InvalidDelay { min: f64, max: f64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("acknowledge called with no dequeued item outstanding")]
    NothingToAcknowledge,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn worker {name}: {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} panicked before finishing its items")]
    ProducerPanicked(String),
}
