//! The asset-transfer contract, simulated against a versioned key/value world state.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Asset {
    #[serde(rename = "ID")]
    pub id: String,
    pub color: String,
    pub size: i64,
    pub owner: String,
    pub appraised_value: i64,
}

impl Asset {
    pub fn new(id: &str, color: &str, size: i64, owner: &str, appraised_value: i64) -> Self {
        Self {
            id: id.to_string(),
            color: color.to_string(),
            size,
            owner: owner.to_string(),
            appraised_value,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("the asset {0} already exists")]
    AssetExists(String),

    #[error("the asset {0} does not exist")]
    AssetMissing(String),

    #[error("Incorrect number of params. Expected {expected}, received {received}")]
    Arity { expected: usize, received: usize },

    #[error("argument {name} is not an integer: {value:?}")]
    NotAnInteger { name: &'static str, value: String },

    #[error("Function {0} not found in contract basic")]
    UnknownFunction(String),

    #[error("corrupt state for key {0}")]
    Corrupt(String),
}

/// A committed value and the block height that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: u64,
}

#[derive(Debug, Default)]
pub struct WorldState {
    height: u64,
    entries: BTreeMap<String, Versioned>,
}

impl WorldState {
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn get(&self, key: &str) -> Option<&Versioned> {
        self.entries.get(key)
    }

    /// Version of `key`, `0` when absent.
    pub fn version(&self, key: &str) -> u64 {
        self.entries.get(key).map(|v| v.version).unwrap_or(0)
    }

    /// Applies a read/write set as the next block, unless one of its reads is stale. Returns
    /// the keys whose version moved since endorsement on conflict.
    pub fn apply(&mut self, rwset: &RwSet) -> Result<u64, Vec<String>> {
        let stale: Vec<String> = rwset
            .reads
            .iter()
            .filter(|(key, version)| self.version(key) != **version)
            .map(|(key, _)| key.clone())
            .collect();
        if !stale.is_empty() {
            return Err(stale);
        }

        self.height += 1;
        for (key, value) in &rwset.writes {
            self.entries.insert(
                key.clone(),
                Versioned {
                    value: value.clone(),
                    version: self.height,
                },
            );
        }
        Ok(self.height)
    }
}

/// Keys read (with the version seen) and written by one simulated invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RwSet {
    pub reads: BTreeMap<String, u64>,
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl RwSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Contract stub over a snapshot of the world state. Reads observe earlier writes of the same
/// invocation.
struct Stub<'a> {
    state: &'a WorldState,
    rwset: RwSet,
}

impl<'a> Stub<'a> {
    fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        if let Some(value) = self.rwset.writes.get(key) {
            return Some(value.clone());
        }
        self.rwset
            .reads
            .insert(key.to_string(), self.state.version(key));
        self.state.get(key).map(|v| v.value.clone())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.rwset.writes.insert(key.to_string(), value);
    }

    fn read_asset(&mut self, id: &str) -> Result<Asset, ContractError> {
        let bytes = self
            .get(id)
            .ok_or_else(|| ContractError::AssetMissing(id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|_| ContractError::Corrupt(id.to_string()))
    }

    fn write_asset(&mut self, asset: &Asset) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(asset).map_err(|_| ContractError::Corrupt(asset.id.clone()))?;
        self.put(&asset.id, bytes);
        Ok(())
    }

    fn exists(&mut self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn all_assets(&mut self) -> Result<Vec<Asset>, ContractError> {
        let keys: Vec<String> = self
            .state
            .entries
            .keys()
            .chain(self.rwset.writes.keys())
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        keys.iter().map(|key| self.read_asset(key)).collect()
    }
}

fn initial_assets() -> Vec<Asset> {
    vec![
        Asset::new("asset1", "blue", 5, "Tomoko", 300),
        Asset::new("asset2", "red", 5, "Brad", 400),
        Asset::new("asset3", "green", 10, "Jin Soo", 500),
        Asset::new("asset4", "yellow", 10, "Max", 600),
        Asset::new("asset5", "black", 15, "Adriana", 700),
        Asset::new("asset6", "white", 15, "Michel", 800),
    ]
}

fn arity(args: &[String], expected: usize) -> Result<(), ContractError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ContractError::Arity {
            expected,
            received: args.len(),
        })
    }
}

fn integer(name: &'static str, value: &str) -> Result<i64, ContractError> {
    value.parse().map_err(|_| ContractError::NotAnInteger {
        name,
        value: value.to_string(),
    })
}

fn asset_from_args(args: &[String]) -> Result<Asset, ContractError> {
    arity(args, 5)?;
    Ok(Asset {
        id: args[0].clone(),
        color: args[1].clone(),
        size: integer("size", &args[2])?,
        owner: args[3].clone(),
        appraised_value: integer("appraisedValue", &args[4])?,
    })
}

fn json<T: Serialize>(value: &T) -> Result<Vec<u8>, ContractError> {
    serde_json::to_vec(value).map_err(|_| ContractError::Corrupt("response".into()))
}

/// Simulates `method(args)` against `state` without modifying it. Returns the contract's payload
/// and the resulting read/write set.
pub fn simulate(
    state: &WorldState,
    method: &str,
    args: &[String],
) -> Result<(Vec<u8>, RwSet), ContractError> {
    let mut stub = Stub {
        state,
        rwset: RwSet::default(),
    };

    let payload = match method {
        "InitLedger" => {
            arity(args, 0)?;
            for asset in initial_assets() {
                stub.write_asset(&asset)?;
            }
            vec![]
        }
        "CreateAsset" => {
            let asset = asset_from_args(args)?;
            if stub.exists(&asset.id) {
                return Err(ContractError::AssetExists(asset.id));
            }
            stub.write_asset(&asset)?;
            vec![]
        }
        "ReadAsset" => {
            arity(args, 1)?;
            json(&stub.read_asset(&args[0])?)?
        }
        "UpdateAsset" => {
            let asset = asset_from_args(args)?;
            if !stub.exists(&asset.id) {
                return Err(ContractError::AssetMissing(asset.id));
            }
            stub.write_asset(&asset)?;
            vec![]
        }
        "TransferAsset" => {
            arity(args, 2)?;
            let mut asset = stub.read_asset(&args[0])?;
            let old_owner = std::mem::replace(&mut asset.owner, args[1].clone());
            stub.write_asset(&asset)?;
            old_owner.into_bytes()
        }
        "AssetExists" => {
            arity(args, 1)?;
            json(&stub.exists(&args[0]))?
        }
        "GetAllAssets" => {
            arity(args, 0)?;
            json(&stub.all_assets()?)?
        }
        other => return Err(ContractError::UnknownFunction(other.to_string())),
    };

    Ok((payload, stub.rwset))
}
