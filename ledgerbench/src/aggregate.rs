//! Summary statistics over a finished batch.
use crate::collector::{Collected, CountedResults};
use ledgerbench_core::{AggregateMetrics, BenchmarkConfig, LatencyDefinition, PhaseMap, TaskResult};
use pdatastructs::tdigest::{TDigest, K1};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Returned instead of metrics when no task of the batch committed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("No successful transactions. Cannot calculate metrics. ({failure_count} of {task_count} tasks failed)")]
pub struct NoSuccessfulTransactions {
    pub task_count: usize,
    pub failure_count: u64,
    pub elapsed: Duration,
    pub failures: PhaseMap<u64>,
}

pub struct MetricsAggregator {
    target_rate: f64,
    task_count: usize,
    latency: LatencyDefinition,
}

impl MetricsAggregator {
    pub fn new(config: &BenchmarkConfig) -> Self {
        Self {
            target_rate: config.target_rate(),
            task_count: config.task_count(),
            latency: config.latency(),
        }
    }

    /// For runs without a release schedule; the reported target rate is zero.
    pub fn unpaced(task_count: usize, latency: LatencyDefinition) -> Self {
        Self {
            target_rate: 0.,
            task_count,
            latency,
        }
    }

    /// `elapsed` is the wall time from dispatch to the join barrier.
    pub fn aggregate(
        &self,
        collected: &Collected,
        elapsed: Duration,
    ) -> Result<AggregateMetrics, NoSuccessfulTransactions> {
        match collected {
            Collected::Detailed(results) => {
                self.from_samples(Samples::from_results(results, self.latency), elapsed)
            }
            Collected::Counted(counted) => {
                self.from_samples(Samples::from_counted(counted), elapsed)
            }
        }
    }

    fn from_samples(
        &self,
        samples: Samples<'_>,
        elapsed: Duration,
    ) -> Result<AggregateMetrics, NoSuccessfulTransactions> {
        let success_count = samples.latencies.len() as u64;
        let failure_count = samples.failures.total();

        if success_count == 0 {
            return Err(NoSuccessfulTransactions {
                task_count: self.task_count,
                failure_count,
                elapsed,
                failures: samples.failures,
            });
        }

        let latencies_ms: Vec<f64> = samples
            .latencies
            .iter()
            .map(|l| l.as_secs_f64() * 1_000.)
            .collect();
        let (mean_latency_ms, stddev_latency_ms) = mean_and_stddev(&latencies_ms);

        let mut digest = default_tdigest();
        for latency in samples.latencies.iter() {
            digest.insert(latency.as_secs_f64());
        }

        let phase_means = PhaseMap::from_fn(|phase| mean_duration(&samples.phases[phase]));

        let secs = elapsed.as_secs_f64();
        let achieved_rate = if secs > 0. {
            success_count as f64 / secs
        } else {
            0.
        };

        debug!(
            "Aggregated {} successes and {} failures over {:?}",
            success_count, failure_count, elapsed
        );

        Ok(AggregateMetrics {
            target_rate: self.target_rate,
            task_count: self.task_count,
            success_count,
            failure_count,
            elapsed,
            achieved_rate,
            mean_latency_ms,
            stddev_latency_ms,
            latency_p50: quantile(&digest, 0.5),
            latency_p90: quantile(&digest, 0.9),
            latency_p99: quantile(&digest, 0.99),
            phase_means,
            failures: samples.failures,
        })
    }
}

/// Borrowed or gathered duration samples, whichever strategy produced them.
struct Samples<'a> {
    latencies: Cow<'a, [Duration]>,
    phases: PhaseMap<Cow<'a, [Duration]>>,
    failures: PhaseMap<u64>,
}

impl<'a> Samples<'a> {
    fn from_results(results: &[TaskResult], latency: LatencyDefinition) -> Samples<'static> {
        let mut latencies = vec![];
        let mut phases = PhaseMap::<Vec<Duration>>::default();
        let mut failures = PhaseMap::<u64>::default();

        for result in results {
            for phase in &result.phases {
                phases[phase.phase].push(phase.elapsed);
            }
            match result.failed_phase() {
                None => latencies.push(result.latency(latency)),
                Some(phase) => failures[phase] += 1,
            }
        }

        Samples {
            latencies: latencies.into(),
            phases: PhaseMap::from_fn(|phase| std::mem::take(&mut phases[phase]).into()),
            failures,
        }
    }

    fn from_counted(counted: &'a CountedResults) -> Samples<'a> {
        Samples {
            latencies: counted.latencies.as_slice().into(),
            phases: PhaseMap::from_fn(|phase| counted.phases[phase].as_slice().into()),
            failures: counted.failures,
        }
    }
}

/// Arithmetic mean and population standard deviation.
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    let mean = statistical::mean(values);
    (mean, statistical::population_standard_deviation(values, Some(mean)))
}

fn mean_duration(values: &[Duration]) -> Option<Duration> {
    if values.is_empty() {
        None
    } else {
        let total: Duration = values.iter().sum();
        match u32::try_from(values.len()) {
            Ok(count) => Some(total / count),
            Err(_) => Some(total.div_f64(values.len() as f64)),
        }
    }
}

fn quantile(digest: &TDigest<K1>, q: f64) -> Duration {
    let secs = digest.quantile(q);

    // NOTE: The t-digest can produce NaN for degenerate inputs.
    if secs.is_finite() && secs >= 0. {
        Duration::from_secs_f64(secs)
    } else {
        error!("Non-finite latency quantile {q}; reporting zero.");
        Duration::ZERO
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
