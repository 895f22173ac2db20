use crate::Phase;
use thiserror::Error;

/// Failure of a single pipeline phase, tagged with the phase it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Failed to create proposal: {detail}")]
    Proposal { detail: String },

    #[error("Endorse error for transaction {transaction_id}: {detail}")]
    Endorse {
        transaction_id: String,
        detail: String,
    },

    #[error("Submit error for transaction {transaction_id}: {detail}")]
    Order {
        transaction_id: String,
        detail: String,
    },

    #[error("Error obtaining commit status for transaction {transaction_id} (timed out: {timed_out}): {detail}")]
    CommitStatus {
        transaction_id: String,
        timed_out: bool,
        detail: String,
    },

    #[error("Transaction {transaction_id} failed to commit with status code {code}")]
    Commit { transaction_id: String, code: i32 },
}

impl PipelineError {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Proposal { .. } => Phase::Propose,
            PipelineError::Endorse { .. } => Phase::Endorse,
            PipelineError::Order { .. } => Phase::Submit,
            PipelineError::CommitStatus { .. } | PipelineError::Commit { .. } => Phase::Status,
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            PipelineError::Proposal { .. } => None,
            PipelineError::Endorse { transaction_id, .. }
            | PipelineError::Order { transaction_id, .. }
            | PipelineError::CommitStatus { transaction_id, .. }
            | PipelineError::Commit { transaction_id, .. } => Some(transaction_id),
        }
    }
}
