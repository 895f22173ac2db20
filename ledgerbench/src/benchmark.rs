//! Batch driver: schedules, runs and joins every task of a benchmark.
use crate::aggregate::{MetricsAggregator, NoSuccessfulTransactions};
use crate::collector::{Collected, CollectorStrategy, ResultCollector, ResultObserver};
use crate::error::BenchError;
use crate::pipeline::Pipeline;
use crate::runner::TaskRunner;
use crate::scheduler::RateScheduler;
use ledgerbench_core::{AggregateMetrics, BenchmarkConfig, Invocation, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

enum Strategy {
    Indexed,
    Streaming(Option<Box<dyn ResultObserver>>),
    Counted,
}

/// An open-loop benchmark over a [`Pipeline`].
///
/// # Example
/// ```no_run
/// use ledgerbench::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example<P: Pipeline>(pipeline: P) -> Result<(), ledgerbench::BenchError> {
/// let outcome = Benchmark::from_rate(20., 200)?
///     .strategy(CollectorStrategy::Counted)
///     .run(Arc::new(pipeline), |i| Invocation::new("CreateAsset", [format!("asset{i}")]))
///     .await?;
///
/// if let Ok(metrics) = outcome.metrics() {
///     println!("{}", SummaryTable::new(&metrics));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Benchmark {
    config: BenchmarkConfig,
    strategy: Strategy,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self {
            config,
            strategy: Strategy::Indexed,
        }
    }

    /// Validates the rate and coerces the task count like [`BenchmarkConfig::new`].
    pub fn from_rate(target_rate: f64, task_count: i64) -> Result<Self, BenchError> {
        Ok(Self::new(BenchmarkConfig::new(target_rate, task_count)?))
    }

    /// Select how results are collected. Replaces any observer set by [`stream_to`](Self::stream_to).
    pub fn strategy(mut self, strategy: CollectorStrategy) -> Self {
        self.strategy = match strategy {
            CollectorStrategy::Indexed => Strategy::Indexed,
            CollectorStrategy::Streaming => Strategy::Streaming(None),
            CollectorStrategy::Counted => Strategy::Counted,
        };
        self
    }

    /// Collect with [`CollectorStrategy::Streaming`] and hand every result to `observer` as soon
    /// as its task completes.
    pub fn stream_to(mut self, observer: impl ResultObserver) -> Self {
        self.strategy = Strategy::Streaming(Some(Box::new(observer)));
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn collector_strategy(&self) -> CollectorStrategy {
        match self.strategy {
            Strategy::Indexed => CollectorStrategy::Indexed,
            Strategy::Streaming(_) => CollectorStrategy::Streaming,
            Strategy::Counted => CollectorStrategy::Counted,
        }
    }

    /// Releases one task per scheduled offset and waits for all of them.
    ///
    /// `invocations` is called once per task index, in order, before the task is spawned. Per-task
    /// failures are recorded in the results; only collection failures and panicked tasks fail the
    /// batch.
    #[instrument(
        name = "benchmark",
        skip_all,
        fields(rate = self.config.target_rate(), tasks = self.config.task_count())
    )]
    pub async fn run<P, F>(
        self,
        pipeline: Arc<P>,
        mut invocations: F,
    ) -> Result<BatchOutcome, BenchError>
    where
        P: Pipeline,
        F: FnMut(usize) -> Invocation,
    {
        let Self { config, strategy } = self;
        let scheduler = RateScheduler::new(&config);
        info!(
            "Releasing {} tasks every {:?} (last at {:?})",
            scheduler.len(),
            scheduler.interval(),
            scheduler.last_offset()
        );

        let collector = match strategy {
            Strategy::Indexed => ResultCollector::indexed(scheduler.len()),
            Strategy::Streaming(observer) => ResultCollector::streaming(scheduler.len(), observer),
            Strategy::Counted => ResultCollector::counted(scheduler.len(), config.latency()),
        };
        let runner = Arc::new(TaskRunner::new(pipeline, config.latency()));

        // NOTE: Every task sleeps until its absolute release time, so spawn latency does not drift
        // the schedule.
        let start = Instant::now();
        let mut handles = Vec::with_capacity(scheduler.len());
        for (index, offset) in scheduler.offsets().enumerate() {
            let invocation = invocations(index);
            let runner = runner.clone();
            let sink = collector.sink();

            handles.push(tokio::spawn(
                async move {
                    tokio::time::sleep_until(start + offset).await;
                    let result = runner.run(index, invocation).await;
                    sink.deliver(result).await
                }
                .in_current_span(),
            ));
        }

        let mut first_error = None;
        for handle in handles {
            let err = match handle.await {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => BenchError::from(err),
                Err(err) => BenchError::from(err),
            };
            error!("{err}");
            first_error.get_or_insert(err);
        }
        let elapsed = start.elapsed();

        if let Some(err) = first_error {
            return Err(err);
        }

        let collected = collector.finish().await?;
        info!(
            "Batch of {} tasks finished in {}",
            collected.len(),
            humantime::format_duration(elapsed)
        );

        Ok(BatchOutcome {
            config,
            elapsed,
            collected,
        })
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    config: BenchmarkConfig,
    elapsed: Duration,
    collected: Collected,
}

impl BatchOutcome {
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Time from batch start to the join barrier.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn collected(&self) -> &Collected {
        &self.collected
    }

    /// Per-task results, unless the batch was collected with [`CollectorStrategy::Counted`].
    pub fn results(&self) -> Option<&[TaskResult]> {
        self.collected.results()
    }

    /// Tasks that did not commit, in index order.
    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results()
            .unwrap_or_default()
            .iter()
            .filter(|r| !r.success())
    }

    pub fn metrics(&self) -> Result<AggregateMetrics, NoSuccessfulTransactions> {
        MetricsAggregator::new(&self.config).aggregate(&self.collected, self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{invocation, ScriptedPipeline};
    use ledgerbench_core::{ConfigError, LatencyDefinition, Phase};
    use std::sync::Mutex;

    fn approx(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    #[ntest::timeout(5_000)]
    async fn uniform_phases() {
        let pipeline = Arc::new(ScriptedPipeline::uniform(Duration::from_millis(10)));

        let outcome = Benchmark::from_rate(5., 5)
            .unwrap()
            .run(pipeline.clone(), invocation)
            .await
            .unwrap();

        let results = outcome.results().unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.success()));
        assert_eq!(pipeline.calls(), 20);

        // Last release at 0.8s, followed by four 10ms phases.
        assert!(outcome.elapsed() >= Duration::from_millis(840));
        assert!(outcome.elapsed() < Duration::from_millis(900));

        let metrics = outcome.metrics().unwrap();
        assert_eq!(metrics.success_count, 5);
        assert_eq!(metrics.failure_count, 0);
        assert!(approx(metrics.mean_latency_ms, 30., 1.));
        assert!(approx(metrics.achieved_rate, 5., 1.));
        for phase in Phase::ALL {
            let mean = metrics.phase_means[phase].unwrap();
            assert!(mean >= Duration::from_millis(10) && mean < Duration::from_millis(11));
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn failure_is_recorded_not_fatal() {
        let pipeline = Arc::new(
            ScriptedPipeline::uniform(Duration::from_millis(5))
                .with_delay(Phase::Status, Duration::from_millis(25))
                .fail_at(1, Phase::Endorse),
        );

        let outcome = Benchmark::from_rate(10., 3)
            .unwrap()
            .run(pipeline, invocation)
            .await
            .unwrap();

        let results = outcome.results().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].success());
        assert_eq!(results[1].failed_phase(), Some(Phase::Endorse));
        assert_eq!(results[1].phases.len(), 1);
        assert!(results[2].success());
        assert_eq!(outcome.failures().map(|r| r.index).collect::<Vec<_>>(), vec![1]);

        let metrics = outcome.metrics().unwrap();
        assert_eq!(metrics.success_count, 2);
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.failures[Phase::Endorse], 1);
        // 5 + 5 + 25ms for both successes.
        assert!(approx(metrics.mean_latency_ms, 35., 1.));
        assert!(approx(metrics.stddev_latency_ms, 0., 0.5));
        assert!(logs_contain("Task 1 failed at Endorse"));
    }

    #[test]
    fn zero_rate_dispatches_nothing() {
        let err = Benchmark::from_rate(0., 5).err().unwrap();
        assert!(matches!(
            err,
            BenchError::Config(ConfigError::NonPositiveRate(rate)) if rate == 0.
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn achieved_rate_follows_schedule() {
        let pipeline = Arc::new(ScriptedPipeline::uniform(Duration::ZERO));

        let outcome = Benchmark::from_rate(10., 10)
            .unwrap()
            .run(pipeline, invocation)
            .await
            .unwrap();

        let elapsed = outcome.elapsed().as_secs_f64();
        assert!(approx(elapsed, 0.9, 0.01));

        let metrics = outcome.metrics().unwrap();
        assert!(approx(metrics.achieved_rate, 10. / elapsed, 1e-9));
        assert!(metrics.achieved_rate > 9. && metrics.achieved_rate < 11.5);
    }

    #[tokio::test(start_paused = true)]
    async fn every_strategy_holds_every_task() {
        for strategy in [
            CollectorStrategy::Indexed,
            CollectorStrategy::Streaming,
            CollectorStrategy::Counted,
        ] {
            let pipeline = Arc::new(
                ScriptedPipeline::uniform(Duration::from_millis(3))
                    .fail_at(2, Phase::Propose)
                    .fail_at(5, Phase::Submit)
                    .reject_commit(7, 11),
            );

            let benchmark = Benchmark::from_rate(100., 12).unwrap().strategy(strategy);
            assert_eq!(benchmark.collector_strategy(), strategy);
            let outcome = benchmark.run(pipeline, invocation).await.unwrap();

            assert_eq!(outcome.collected().len(), 12);
            let metrics = outcome.metrics().unwrap();
            assert_eq!(metrics.success_count, 9);
            assert_eq!(metrics.failures[Phase::Propose], 1);
            assert_eq!(metrics.failures[Phase::Submit], 1);
            assert_eq!(metrics.failures[Phase::Status], 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_observer_sees_each_task_once() {
        let seen = Arc::new(Mutex::new(vec![]));
        let observed = seen.clone();
        let pipeline = Arc::new(ScriptedPipeline::uniform(Duration::from_millis(1)));

        let outcome = Benchmark::from_rate(50., 8)
            .unwrap()
            .stream_to(move |r: &TaskResult| observed.lock().unwrap().push(r.index))
            .run(pipeline, invocation)
            .await
            .unwrap();

        assert_eq!(outcome.results().unwrap().len(), 8);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_yield_no_data() {
        let pipeline = Arc::new(
            ScriptedPipeline::uniform(Duration::ZERO)
                .fail_at(0, Phase::Status)
                .fail_at(1, Phase::Status),
        );
        let config = BenchmarkConfig::new(10., 2)
            .unwrap()
            .with_latency(LatencyDefinition::EndToEnd);

        let outcome = Benchmark::new(config)
            .run(pipeline, invocation)
            .await
            .unwrap();

        let err = outcome.metrics().unwrap_err();
        assert_eq!(err.failure_count, 2);
        assert_eq!(err.failures[Phase::Status], 2);
    }
}
