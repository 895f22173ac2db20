//! A single-peer ledger that runs the asset-transfer contract over HTTP/JSON.
//!
//! Transactions go through the same four steps as on a real network: a proposal is created,
//! endorsed by simulating the contract against the current state, ordered, and finally committed
//! in the background. Commit validation rejects transactions whose reads went stale in the
//! meantime with `MVCC_READ_CONFLICT`.
pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod server;
pub mod wire;

pub use config::MockConfig;
pub use error::LedgerError;
pub use ledger::Ledger;
pub use server::{router, run, serve};

pub mod prelude {
    pub use crate::contract::Asset;
    pub use crate::wire::*;
}
