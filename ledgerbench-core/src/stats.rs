use crate::PhaseMap;
use std::time::Duration;

/// Aggregate figures for a finished batch.
///
/// Latency statistics only cover successful tasks. Per-phase means cover every task that completed
/// the phase, including tasks that failed later on.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMetrics {
    pub target_rate: f64,
    pub task_count: usize,
    pub success_count: u64,
    pub failure_count: u64,
    pub elapsed: Duration,
    pub achieved_rate: f64,
    pub mean_latency_ms: f64,
    pub stddev_latency_ms: f64,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p99: Duration,
    pub phase_means: PhaseMap<Option<Duration>>,
    pub failures: PhaseMap<u64>,
}

impl AggregateMetrics {
    pub fn mean_latency(&self) -> Duration {
        Duration::from_secs_f64(self.mean_latency_ms / 1_000.)
    }

    pub fn error_rate(&self) -> f64 {
        self.failure_count as f64 / self.task_count as f64
    }
}
