//! Run configuration and the per-item random delay range.

use std::time::Duration;

use rand::Rng;

use crate::errors::ConfigError;

pub const DEFAULT_PRODUCERS: usize = 4;
pub const DEFAULT_CONSUMERS: usize = 5;
pub const DEFAULT_ITEMS_PER_PRODUCER: usize = 10;
pub const DEFAULT_DELAY_MIN_S: f64 = 0.1;
pub const DEFAULT_DELAY_MAX_S: f64 = 0.3;

/// Inclusive range of simulated latency, in seconds, drawn before each item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayRange {
    min: f64,
    max: f64,
}

impl DelayRange {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        // Both bounds must convert to a Duration, so sampling can never panic.
        let representable = |secs: f64| Duration::try_from_secs_f64(secs).is_ok();
        if !representable(min) || !representable(max) || min > max {
            return Err(ConfigError::InvalidDelay { min, max });
        }
        Ok(Self { min, max })
    }

    /// No latency at all.
    #[cfg(test)]
    pub fn none() -> Self {
        Self { min: 0.0, max: 0.0 }
    }

    /// Draw a delay uniformly from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max == 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rng.gen_range(self.min..=self.max))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_DELAY_MIN_S,
            max: DEFAULT_DELAY_MAX_S,
        }
    }
}

/// Worker population and per-worker workload for one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunConfig {
    pub producers: usize,
    pub consumers: usize,
    pub items_per_producer: usize,
    pub delay: DelayRange,
}

impl RunConfig {
    /// Reject configurations that could never start a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.producers == 0 {
            return Err(ConfigError::ZeroProducers);
        }
        if self.consumers == 0 {
            return Err(ConfigError::ZeroConsumers);
        }
        if self.items_per_producer == 0 {
            return Err(ConfigError::ZeroItems);
        }
        // Fields are public, so re-check the range in case it was built by hand.
        DelayRange::new(self.delay.min, self.delay.max)?;
        Ok(())
    }

    /// Number of items the whole run must enqueue and acknowledge.
    pub fn total_items(&self) -> usize {
        self.producers * self.items_per_producer
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            producers: DEFAULT_PRODUCERS,
            consumers: DEFAULT_CONSUMERS,
            items_per_producer: DEFAULT_ITEMS_PER_PRODUCER,
            delay: DelayRange::default(),
        }
    }
}
