//! Client side of the asset-transfer ledger: an HTTP gateway whose contracts can be driven by
//! `ledgerbench`, plus contract helpers.
pub mod assets;
pub mod gateway;

pub use gateway::{
    Commit, ConnectOptions, Contract, Gateway, GatewayError, Identity, Network, Proposal,
    Timeouts, Transaction,
};
