use crate::collector::CollectError;
use ledgerbench_core::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Invalid benchmark configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to collect results: {0}")]
    Collect(#[from] CollectError),

    #[error("Task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}
