use crate::contract::ContractError;
use std::sync::PoisonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("transaction {0} not found")]
    UnknownTransaction(String),

    #[error("transaction {transaction_id} is {state}; it must be {expected} first")]
    OutOfOrder {
        transaction_id: String,
        state: &'static str,
        expected: &'static str,
    },

    #[error("failed to evaluate transaction, see attached details for more info")]
    Evaluate(#[source] ContractError),

    #[error("failed to endorse transaction {transaction_id}, see attached details for more info")]
    Endorse {
        transaction_id: String,
        #[source]
        source: ContractError,
    },

    #[error("Ledger state is poisoned")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for LedgerError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

impl LedgerError {
    /// The contract failure reported by the peer, if any.
    pub fn contract_error(&self) -> Option<&ContractError> {
        match self {
            LedgerError::Evaluate(source) | LedgerError::Endorse { source, .. } => Some(source),
            _ => None,
        }
    }
}
