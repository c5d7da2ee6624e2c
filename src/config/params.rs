//! Chain parameters
//!
//! Consensus constants are resolved once when a ledger is opened and passed
//! down explicitly. They start from a built-in network profile and can be
//! overridden by a TOML file and then by `CASCADE_CHAIN_*` environment
//! variables.

use crate::core::genesis::GENESIS_SCRIPT;
use crate::core::magic::MIN_HASHES;
use crate::core::{script_address, Hash, MagicBounds, MAX_CASCADE_LEVELS};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const ENV_PREFIX: &str = "CASCADE_CHAIN_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl FromStr for Network {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(LedgerError::Config(format!("Unknown network: {other}"))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub network: Network,
    pub chain_id: u8,
    /// Super levels tracked by headers and the cascade
    pub cascade_levels: usize,
    /// Nodes kept per level when the cascade is thinned
    pub cascade_level_nodes: usize,
    /// Blocks kept in the tree below the tip
    pub cascade_start_depth: u64,
    /// Extra blocks allowed to build up before the root moves
    pub cascade_frequency: u64,
    /// Oldest coin proof accepted, in blocks
    pub proof_history: u64,
    /// Average hashes for the easiest allowed unit
    pub min_hashes: u64,
    pub genesis_time: u64,
    pub genesis_address: Hash,
}

impl ChainParams {
    pub fn mainnet() -> Result<ChainParams> {
        Ok(ChainParams {
            network: Network::Mainnet,
            chain_id: 1,
            cascade_levels: 32,
            cascade_level_nodes: 256,
            cascade_start_depth: 2048,
            cascade_frequency: 100,
            proof_history: 256,
            min_hashes: MIN_HASHES,
            genesis_time: 1_700_000_000_000,
            genesis_address: script_address(GENESIS_SCRIPT)?,
        })
    }

    pub fn testnet() -> Result<ChainParams> {
        Ok(ChainParams {
            network: Network::Testnet,
            chain_id: 2,
            min_hashes: 1_000,
            ..ChainParams::mainnet()?
        })
    }

    /// Small and fast: every hash meets the work floor and the cascade moves
    /// after a few dozen blocks
    pub fn devnet() -> Result<ChainParams> {
        Ok(ChainParams {
            network: Network::Devnet,
            chain_id: 3,
            cascade_levels: 8,
            cascade_level_nodes: 4,
            cascade_start_depth: 16,
            cascade_frequency: 4,
            proof_history: 8,
            min_hashes: 1,
            ..ChainParams::mainnet()?
        })
    }

    pub fn for_network(network: Network) -> Result<ChainParams> {
        match network {
            Network::Mainnet => ChainParams::mainnet(),
            Network::Testnet => ChainParams::testnet(),
            Network::Devnet => ChainParams::devnet(),
        }
    }

    /// Profile, then file, then environment
    pub fn load(network: Network, config_file: Option<&Path>) -> Result<ChainParams> {
        let mut overrides = match config_file {
            Some(path) => ParamOverrides::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => ParamOverrides::default(),
        };
        let env = ParamOverrides::from_lookup(|key| std::env::var(key).ok())?;
        overrides.merge(env);

        let mut params = ChainParams::for_network(overrides.network.unwrap_or(network))?;
        overrides.apply(&mut params);
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cascade_levels == 0 || self.cascade_levels > MAX_CASCADE_LEVELS {
            return Err(LedgerError::Config(format!(
                "cascade_levels must be between 1 and {MAX_CASCADE_LEVELS}"
            )));
        }
        if self.cascade_level_nodes == 0 {
            return Err(LedgerError::Config("cascade_level_nodes must be at least 1".to_string()));
        }
        if self.cascade_frequency == 0 {
            return Err(LedgerError::Config("cascade_frequency must be at least 1".to_string()));
        }
        // proofs must always land on a snapshot still in the tree
        if self.proof_history == 0 || self.proof_history >= self.cascade_start_depth {
            return Err(LedgerError::Config(format!(
                "proof_history must be between 1 and cascade_start_depth - 1 ({})",
                self.cascade_start_depth.saturating_sub(1)
            )));
        }
        if self.min_hashes == 0 {
            return Err(LedgerError::Config("min_hashes must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn magic_bounds(&self) -> MagicBounds {
        MagicBounds::new(self.min_hashes)
    }
}

/// Optional values from a file or the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamOverrides {
    pub network: Option<Network>,
    pub chain_id: Option<u8>,
    pub cascade_levels: Option<usize>,
    pub cascade_level_nodes: Option<usize>,
    pub cascade_start_depth: Option<u64>,
    pub cascade_frequency: Option<u64>,
    pub proof_history: Option<u64>,
    pub min_hashes: Option<u64>,
    pub genesis_time: Option<u64>,
    pub genesis_address: Option<Hash>,
}

fn parse_env<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LedgerError::Config(format!("Invalid value for {key}: {raw}"))),
        None => Ok(None),
    }
}

impl ParamOverrides {
    pub fn from_toml_str(contents: &str) -> Result<ParamOverrides> {
        Ok(toml::from_str(contents)?)
    }

    /// Read `CASCADE_CHAIN_<FIELD>` keys through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<ParamOverrides>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            let value = lookup(&key);
            (key, value)
        };

        let (key, value) = get("NETWORK");
        let network = parse_env::<Network>(&key, value)?;
        let (key, value) = get("CHAIN_ID");
        let chain_id = parse_env(&key, value)?;
        let (key, value) = get("CASCADE_LEVELS");
        let cascade_levels = parse_env(&key, value)?;
        let (key, value) = get("CASCADE_LEVEL_NODES");
        let cascade_level_nodes = parse_env(&key, value)?;
        let (key, value) = get("CASCADE_START_DEPTH");
        let cascade_start_depth = parse_env(&key, value)?;
        let (key, value) = get("CASCADE_FREQUENCY");
        let cascade_frequency = parse_env(&key, value)?;
        let (key, value) = get("PROOF_HISTORY");
        let proof_history = parse_env(&key, value)?;
        let (key, value) = get("MIN_HASHES");
        let min_hashes = parse_env(&key, value)?;
        let (key, value) = get("GENESIS_TIME");
        let genesis_time = parse_env(&key, value)?;
        let (key, value) = get("GENESIS_ADDRESS");
        let genesis_address = parse_env::<Hash>(&key, value)?;

        Ok(ParamOverrides {
            network,
            chain_id,
            cascade_levels,
            cascade_level_nodes,
            cascade_start_depth,
            cascade_frequency,
            proof_history,
            min_hashes,
            genesis_time,
            genesis_address,
        })
    }

    /// Values set in `other` win
    pub fn merge(&mut self, other: ParamOverrides) {
        self.network = other.network.or(self.network);
        self.chain_id = other.chain_id.or(self.chain_id);
        self.cascade_levels = other.cascade_levels.or(self.cascade_levels);
        self.cascade_level_nodes = other.cascade_level_nodes.or(self.cascade_level_nodes);
        self.cascade_start_depth = other.cascade_start_depth.or(self.cascade_start_depth);
        self.cascade_frequency = other.cascade_frequency.or(self.cascade_frequency);
        self.proof_history = other.proof_history.or(self.proof_history);
        self.min_hashes = other.min_hashes.or(self.min_hashes);
        self.genesis_time = other.genesis_time.or(self.genesis_time);
        self.genesis_address = other.genesis_address.or(self.genesis_address);
    }

    pub fn apply(&self, params: &mut ChainParams) {
        if let Some(v) = self.chain_id {
            params.chain_id = v;
        }
        if let Some(v) = self.cascade_levels {
            params.cascade_levels = v;
        }
        if let Some(v) = self.cascade_level_nodes {
            params.cascade_level_nodes = v;
        }
        if let Some(v) = self.cascade_start_depth {
            params.cascade_start_depth = v;
        }
        if let Some(v) = self.cascade_frequency {
            params.cascade_frequency = v;
        }
        if let Some(v) = self.proof_history {
            params.proof_history = v;
        }
        if let Some(v) = self.min_hashes {
            params.min_hashes = v;
        }
        if let Some(v) = self.genesis_time {
            params.genesis_time = v;
        }
        if let Some(v) = self.genesis_address {
            params.genesis_address = v;
        }
    }
}
