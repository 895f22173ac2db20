#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod benchmark;
pub mod collector;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod sequence;

pub(crate) mod runner;
pub(crate) mod timer;

pub use aggregate::{MetricsAggregator, NoSuccessfulTransactions};
pub use benchmark::{BatchOutcome, Benchmark};
pub use collector::{Collected, CollectorStrategy, CountedResults, ResultObserver};
pub use error::BenchError;
pub use pipeline::Pipeline;
pub use scheduler::RateScheduler;
pub use sequence::{Sequence, SequenceOutcome};

/// Shared data model, re-exported for convenience.
pub use ledgerbench_core as core;

pub mod prelude {
    pub use crate::benchmark::{BatchOutcome, Benchmark};
    pub use crate::collector::{CollectorStrategy, ResultObserver};
    pub use crate::pipeline::Pipeline;
    pub use crate::report::{CsvStream, DetailTable, FailureList, PhaseBreakdown, SummaryTable};
    pub use crate::sequence::Sequence;
    pub use ledgerbench_core::{
        AggregateMetrics, BenchmarkConfig, CommitStatus, Invocation, LatencyDefinition, Phase,
        PipelineError, TaskOutcome, TaskResult,
    };
}

#[cfg(test)]
pub(crate) mod testing;
