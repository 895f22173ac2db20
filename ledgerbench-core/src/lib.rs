mod config;
mod constants;
mod error;
mod metrics;
mod phase;
mod result;
mod stats;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use metrics::*;
pub use phase::*;
pub use result::*;
pub use stats::*;
