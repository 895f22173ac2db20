//! Scripted pipeline used by the unit tests.
use crate::pipeline::Pipeline;
use ledgerbench_core::{
    CommitStatus, Invocation, Phase, PhaseMap, PipelineError, VALID_COMMIT_CODE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Invocation understood by [`ScriptedPipeline`]: the task index travels as the first argument.
pub(crate) fn invocation(index: usize) -> Invocation {
    Invocation::new("CreateAsset", [index.to_string()])
}

pub(crate) struct ScriptedPipeline {
    delays: PhaseMap<Duration>,
    failures: HashMap<usize, Phase>,
    rejected: HashMap<usize, i32>,
    calls: AtomicUsize,
}

impl ScriptedPipeline {
    pub fn uniform(delay: Duration) -> Self {
        Self {
            delays: PhaseMap::from_fn(|_| delay),
            failures: HashMap::new(),
            rejected: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, phase: Phase, delay: Duration) -> Self {
        self.delays[phase] = delay;
        self
    }

    pub fn fail_at(mut self, index: usize, phase: Phase) -> Self {
        self.failures.insert(index, phase);
        self
    }

    pub fn reject_commit(mut self, index: usize, code: i32) -> Self {
        self.rejected.insert(index, code);
        self
    }

    /// Total number of phase calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn step(&self, index: usize, phase: Phase) -> Result<usize, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays[phase];
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failures.get(&index) == Some(&phase) {
            Err(failure(index, phase))
        } else {
            Ok(index)
        }
    }
}

fn failure(index: usize, phase: Phase) -> PipelineError {
    let transaction_id = format!("tx-{index}");
    let detail = format!("scripted {phase} failure");
    match phase {
        Phase::Propose => PipelineError::Proposal { detail },
        Phase::Endorse => PipelineError::Endorse {
            transaction_id,
            detail,
        },
        Phase::Submit => PipelineError::Order {
            transaction_id,
            detail,
        },
        Phase::Status => PipelineError::CommitStatus {
            transaction_id,
            timed_out: true,
            detail,
        },
    }
}

impl Pipeline for ScriptedPipeline {
    type Proposal = usize;
    type Transaction = usize;
    type Commit = usize;

    async fn propose(&self, invocation: &Invocation) -> Result<usize, PipelineError> {
        let index = invocation
            .args
            .first()
            .and_then(|arg| arg.parse().ok())
            .ok_or_else(|| PipelineError::Proposal {
                detail: "missing task index".into(),
            })?;
        self.step(index, Phase::Propose).await
    }

    async fn endorse(&self, proposal: usize) -> Result<usize, PipelineError> {
        self.step(proposal, Phase::Endorse).await
    }

    async fn submit(&self, transaction: usize) -> Result<usize, PipelineError> {
        self.step(transaction, Phase::Submit).await
    }

    async fn status(&self, commit: usize) -> Result<CommitStatus, PipelineError> {
        let index = self.step(commit, Phase::Status).await?;
        let code = self.rejected.get(&index).copied().unwrap_or(VALID_COMMIT_CODE);
        Ok(CommitStatus {
            transaction_id: format!("tx-{index}"),
            code,
            successful: code == VALID_COMMIT_CODE,
        })
    }
}
