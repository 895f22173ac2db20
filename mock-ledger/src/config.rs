use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_PEER_ADDRESS: &str = "peer0.org1.example.com:7051";
pub const DEFAULT_MSP_ID: &str = "Org1MSP";

/// Behaviour of a mock ledger instance.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub endorse_delay: Duration,
    pub order_delay: Duration,
    pub commit_delay: Duration,
    /// Caps how many transactions per second the ordering route lets through.
    pub max_order_rate: Option<NonZeroU32>,
    /// Peer reported in error details.
    pub peer_address: String,
    pub msp_id: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            endorse_delay: Duration::ZERO,
            order_delay: Duration::ZERO,
            commit_delay: Duration::ZERO,
            max_order_rate: None,
            peer_address: DEFAULT_PEER_ADDRESS.to_string(),
            msp_id: DEFAULT_MSP_ID.to_string(),
        }
    }
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endorse_delay(mut self, delay: Duration) -> Self {
        self.endorse_delay = delay;
        self
    }

    pub fn order_delay(mut self, delay: Duration) -> Self {
        self.order_delay = delay;
        self
    }

    pub fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    /// Same delay for the endorse, order and commit phases.
    pub fn phase_delay(self, delay: Duration) -> Self {
        self.endorse_delay(delay)
            .order_delay(delay)
            .commit_delay(delay)
    }

    /// A rate of zero removes the cap.
    pub fn max_order_rate(mut self, rate: u32) -> Self {
        self.max_order_rate = NonZeroU32::new(rate);
        self
    }
}
