//! Transactions submitted one after another, each released once the previous one has finished.
//!
//! Useful to look at the time each phase takes on an otherwise idle backend, without the queueing
//! a paced batch adds.
use crate::aggregate::{MetricsAggregator, NoSuccessfulTransactions};
use crate::collector::Collected;
use crate::pipeline::Pipeline;
use crate::runner::TaskRunner;
use ledgerbench_core::{AggregateMetrics, Invocation, LatencyDefinition, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    task_count: usize,
    latency: LatencyDefinition,
}

impl Sequence {
    /// A `task_count` of zero or less runs a single transaction.
    pub fn new(task_count: i64) -> Self {
        Self {
            task_count: usize::try_from(task_count).unwrap_or(0).max(1),
            latency: LatencyDefinition::default(),
        }
    }

    pub fn latency(mut self, latency: LatencyDefinition) -> Self {
        self.latency = latency;
        self
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    #[instrument(name = "sequence", skip_all, fields(tasks = self.task_count))]
    pub async fn run<P, F>(self, pipeline: Arc<P>, mut invocations: F) -> SequenceOutcome
    where
        P: Pipeline,
        F: FnMut(usize) -> Invocation,
    {
        let runner = TaskRunner::new(pipeline, self.latency);
        let start = Instant::now();

        let mut results = Vec::with_capacity(self.task_count);
        for index in 0..self.task_count {
            let result = runner
                .run(index, invocations(index))
                .in_current_span()
                .await;
            if let Some(id) = result.transaction_id().filter(|_| result.success()) {
                info!("Transaction {id} committed successfully");
            }
            results.push(result);
        }

        let elapsed = start.elapsed();
        info!(
            "Sequence of {} transactions finished in {}",
            results.len(),
            humantime::format_duration(elapsed)
        );

        SequenceOutcome {
            sequence: self,
            elapsed,
            collected: Collected::Detailed(results),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    sequence: Sequence,
    elapsed: Duration,
    collected: Collected,
}

impl SequenceOutcome {
    /// Time from the first release to the end of the last transaction.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn results(&self) -> &[TaskResult] {
        self.collected.results().unwrap_or_default()
    }

    /// Statistics of the run. The target rate is reported as zero since nothing was paced.
    pub fn metrics(&self) -> Result<AggregateMetrics, NoSuccessfulTransactions> {
        MetricsAggregator::unpaced(self.sequence.task_count, self.sequence.latency)
            .aggregate(&self.collected, self.elapsed)
    }
}
