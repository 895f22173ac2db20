//! The staged transaction protocol driven by a benchmark.
use ledgerbench_core::{CommitStatus, Invocation, PipelineError};
use std::future::Future;

/// A backend that submits transactions in four sequential phases.
///
/// Each phase consumes the handle produced by the previous one, so a task can only ever call them
/// once and in order. Implementations must not retry internally, and must be safe to share between
/// every task of a batch.
///
/// A [`status`](Pipeline::status) call that succeeds with an unsuccessful [`CommitStatus`] is
/// not an error at this level; the task runner turns it into [`PipelineError::Commit`].
pub trait Pipeline: Send + Sync + 'static {
    type Proposal: Send;
    type Transaction: Send;
    type Commit: Send;

    fn propose(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<Self::Proposal, PipelineError>> + Send;

    fn endorse(
        &self,
        proposal: Self::Proposal,
    ) -> impl Future<Output = Result<Self::Transaction, PipelineError>> + Send;

    fn submit(
        &self,
        transaction: Self::Transaction,
    ) -> impl Future<Output = Result<Self::Commit, PipelineError>> + Send;

    fn status(
        &self,
        commit: Self::Commit,
    ) -> impl Future<Output = Result<CommitStatus, PipelineError>> + Send;
}
