//! Helpers for the asset-transfer contract.
use ledgerbench::core::Invocation;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub const INIT_LEDGER: &str = "InitLedger";
pub const CREATE_ASSET: &str = "CreateAsset";
pub const READ_ASSET: &str = "ReadAsset";
pub const GET_ALL_ASSETS: &str = "GetAllAssets";
pub const TRANSFER_ASSET: &str = "TransferAsset";
pub const UPDATE_ASSET: &str = "UpdateAsset";

/// Produces unique-looking 64 hex digit asset ids from an explicit seed, so two runs with the same
/// seed create the same assets.
pub struct AssetIdGenerator {
    rng: SmallRng,
}

impl AssetIdGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn next_id(&mut self) -> String {
        let bytes: [u8; 32] = self.rng.gen();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// The `CreateAsset` call used by the benchmarks and the sequential create command.
pub fn create_asset_invocation(id: &str) -> Invocation {
    Invocation::new(CREATE_ASSET, [id, "yellow", "5", "Tom", "1300"])
}

/// Re-indents a JSON payload; anything that is not JSON is returned as text.
pub fn pretty_json(payload: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(payload).into_owned()),
        Err(_) => String::from_utf8_lossy(payload).into_owned(),
    }
}
