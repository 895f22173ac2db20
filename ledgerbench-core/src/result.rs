use crate::{LatencyDefinition, Phase, PhaseDuration, PipelineError, LATENCY_PHASES};
use std::time::Duration;
use time::OffsetDateTime;

/// A contract method call handed to the propose phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub method: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(method: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: method.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Final status reported by the commit phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    pub transaction_id: String,
    pub code: i32,
    pub successful: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Committed { transaction_id: String },
    Failed { phase: Phase, error: PipelineError },
}

/// Everything measured for one task of a batch.
///
/// `phases` only holds phases that completed, in execution order. A failed task never has a
/// duration for its failed phase or anything after it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub index: usize,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub span: Duration,
    pub phases: Vec<PhaseDuration>,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Committed { .. })
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        match &self.outcome {
            TaskOutcome::Failed { phase, .. } => Some(*phase),
            TaskOutcome::Committed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            TaskOutcome::Failed { error, .. } => Some(error),
            TaskOutcome::Committed { .. } => None,
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Committed { transaction_id } => Some(transaction_id),
            TaskOutcome::Failed { error, .. } => error.transaction_id(),
        }
    }

    pub fn phase(&self, phase: Phase) -> Option<Duration> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| p.elapsed)
    }

    /// Sum of the recorded endorse, submit and status durations.
    pub fn phase_sum(&self) -> Duration {
        LATENCY_PHASES
            .iter()
            .filter_map(|phase| self.phase(*phase))
            .sum()
    }

    pub fn latency(&self, definition: LatencyDefinition) -> Duration {
        match definition {
            LatencyDefinition::PhaseSum => self.phase_sum(),
            LatencyDefinition::EndToEnd => self.span,
        }
    }

    /// Checks the phase bookkeeping against the outcome.
    pub fn is_consistent(&self) -> bool {
        let in_order = self.phases.windows(2).all(|w| w[0].phase < w[1].phase);
        let expected = match self.failed_phase() {
            Some(failed) => Phase::ALL.iter().take_while(|p| **p < failed).count(),
            None => Phase::ALL.len(),
        };
        in_order
            && self.phases.len() == expected
            && self.phases.iter().zip(Phase::ALL).all(|(p, phase)| p.phase == phase)
    }
}
