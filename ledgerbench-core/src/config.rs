use crate::{DEFAULT_TARGET_RATE, DEFAULT_TASK_COUNT};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid target rate {0}; the rate must be a positive number of transactions per second")]
    NonPositiveRate(f64),
}

/// How a task's latency is derived from its measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyDefinition {
    /// Sum of the endorse, submit and status phase durations.
    #[default]
    PhaseSum,
    /// Monotonic span from the start of the first phase to the end of the last one attempted.
    EndToEnd,
}

/// Parameters of a single benchmark run.
///
/// Validated on construction and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    target_rate: f64,
    task_count: usize,
    latency: LatencyDefinition,
}

impl BenchmarkConfig {
    /// A `task_count` of zero or less is coerced to a single task; a rate that is not strictly
    /// positive is rejected.
    pub fn new(target_rate: f64, task_count: i64) -> Result<Self, ConfigError> {
        if !(target_rate.is_finite() && target_rate > 0.) {
            return Err(ConfigError::NonPositiveRate(target_rate));
        }

        Ok(Self {
            target_rate,
            task_count: usize::try_from(task_count).unwrap_or(0).max(1),
            latency: LatencyDefinition::default(),
        })
    }

    pub fn with_latency(mut self, latency: LatencyDefinition) -> Self {
        self.latency = latency;
        self
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    pub fn latency(&self) -> LatencyDefinition {
        self.latency
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            target_rate: DEFAULT_TARGET_RATE,
            task_count: DEFAULT_TASK_COUNT,
            latency: LatencyDefinition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_rates() {
        assert_eq!(
            BenchmarkConfig::new(0., 10),
            Err(ConfigError::NonPositiveRate(0.))
        );
        assert!(BenchmarkConfig::new(-3., 10).is_err());
        assert!(BenchmarkConfig::new(f64::NAN, 10).is_err());
        assert!(BenchmarkConfig::new(f64::INFINITY, 10).is_err());
    }

    #[test]
    fn coerces_task_count() {
        assert_eq!(BenchmarkConfig::new(5., 0).unwrap().task_count(), 1);
        assert_eq!(BenchmarkConfig::new(5., -7).unwrap().task_count(), 1);
        assert_eq!(BenchmarkConfig::new(5., 42).unwrap().task_count(), 42);
    }

    #[test]
    fn latency_defaults_to_phase_sum() {
        let config = BenchmarkConfig::new(2.5, 3).unwrap();
        assert_eq!(config.latency(), LatencyDefinition::PhaseSum);
        assert_eq!(
            config.with_latency(LatencyDefinition::EndToEnd).latency(),
            LatencyDefinition::EndToEnd
        );
    }
}
