//! Release schedule for open-loop load generation.
use ledgerbench_core::{BenchmarkConfig, ConfigError};
use std::time::Duration;

/// Computes when each task of a batch is released, relative to the batch start.
///
/// Offsets are `i / target_rate` for `i in 0..task_count`. They never depend on how long earlier
/// tasks take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateScheduler {
    target_rate: f64,
    task_count: usize,
}

impl RateScheduler {
    pub fn new(config: &BenchmarkConfig) -> Self {
        Self {
            target_rate: config.target_rate(),
            task_count: config.task_count(),
        }
    }

    /// Same validation and coercion rules as [`BenchmarkConfig::new`].
    pub fn try_new(target_rate: f64, task_count: i64) -> Result<Self, ConfigError> {
        BenchmarkConfig::new(target_rate, task_count).map(|config| Self::new(&config))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1. / self.target_rate)
    }

    pub fn offset(&self, index: usize) -> Duration {
        Duration::from_secs_f64(index as f64 / self.target_rate)
    }

    pub fn offsets(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.task_count).map(|i| self.offset(i))
    }

    pub fn last_offset(&self) -> Duration {
        self.offset(self.task_count - 1)
    }

    pub fn len(&self) -> usize {
        self.task_count
    }

    pub fn is_empty(&self) -> bool {
        self.task_count == 0
    }
}
