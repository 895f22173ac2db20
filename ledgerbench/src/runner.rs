use crate::pipeline::Pipeline;
use crate::timer::PhaseTimer;
use ledgerbench_core::{
    CommitStatus, Invocation, LatencyDefinition, Phase, PipelineError, TaskOutcome, TaskResult,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Runs the phase sequence of one task and turns it into a [`TaskResult`].
pub(crate) struct TaskRunner<P> {
    pipeline: Arc<P>,
    latency: LatencyDefinition,
}

impl<P: Pipeline> TaskRunner<P> {
    pub fn new(pipeline: Arc<P>, latency: LatencyDefinition) -> Self {
        Self { pipeline, latency }
    }

    pub async fn run(&self, index: usize, invocation: Invocation) -> TaskResult {
        let start = OffsetDateTime::now_utc();
        let began = Instant::now();
        let mut timer = PhaseTimer::new();

        let outcome = match self.phases(&mut timer, &invocation).await {
            Ok(status) => TaskOutcome::Committed {
                transaction_id: status.transaction_id,
            },
            Err((phase, error)) => {
                warn!("Task {index} failed at {phase}: {error}");
                TaskOutcome::Failed { phase, error }
            }
        };

        let span = began.elapsed();
        let result = TaskResult {
            index,
            start,
            end: OffsetDateTime::now_utc(),
            span,
            phases: timer.into_phases(),
            outcome,
        };
        debug_assert!(result.is_consistent());

        record_outcome(&result, self.latency);
        trace!(
            "Task {index} finished in {:?} (success: {})",
            span,
            result.success()
        );
        result
    }

    // NOTE: Each stage handle is moved into the next call, so no phase can run twice or out of order.
    async fn phases(
        &self,
        timer: &mut PhaseTimer,
        invocation: &Invocation,
    ) -> Result<CommitStatus, (Phase, PipelineError)> {
        let pipeline = &self.pipeline;

        let proposal = timer
            .time(Phase::Propose, pipeline.propose(invocation))
            .await?;
        let transaction = timer
            .time(Phase::Endorse, pipeline.endorse(proposal))
            .await?;
        let commit = timer
            .time(Phase::Submit, pipeline.submit(transaction))
            .await?;

        timer
            .time(Phase::Status, async move {
                let status = pipeline.status(commit).await?;
                if status.successful {
                    Ok(status)
                } else {
                    Err(PipelineError::Commit {
                        transaction_id: status.transaction_id,
                        code: status.code,
                    })
                }
            })
            .await
    }
}

#[cfg(feature = "metrics")]
fn record_outcome(result: &TaskResult, latency: LatencyDefinition) {
    let labels = ledgerbench_core::TASK_LABELS;
    if result.success() {
        metrics::counter!(labels.success).increment(1);
        metrics::histogram!(labels.latency).record(result.latency(latency).as_secs_f64());
    } else {
        let phase = result.failed_phase().map(Phase::as_str).unwrap_or("unknown");
        metrics::counter!(labels.error, "phase" => phase).increment(1);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_outcome(_result: &TaskResult, _latency: LatencyDefinition) {}
