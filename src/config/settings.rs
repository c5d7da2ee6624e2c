use crate::config::params::{ChainParams, Network};
use crate::error::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_DATA_DIR: &str = "data";

const DATA_DIR_KEY: &str = "DATA_DIR";
const NETWORK_KEY: &str = "NETWORK";
const CONFIG_FILE_KEY: &str = "CONFIG_FILE";

/// Node-local settings: where the database lives, which network profile to
/// start from and an optional parameter file
pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();
        let data_dir =
            env::var("CASCADE_CHAIN_DATA_DIR").unwrap_or_else(|_| String::from(DEFAULT_DATA_DIR));
        map.insert(String::from(DATA_DIR_KEY), data_dir);

        if let Ok(network) = env::var("CASCADE_CHAIN_NETWORK") {
            map.insert(String::from(NETWORK_KEY), network);
        }
        if let Ok(file) = env::var("CASCADE_CHAIN_CONFIG_FILE") {
            map.insert(String::from(CONFIG_FILE_KEY), file);
        }

        Config {
            inner: RwLock::new(map),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(String::from(key), value);
    }

    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(self.get(DATA_DIR_KEY).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()))
    }

    pub fn set_data_dir(&self, dir: String) {
        self.set(DATA_DIR_KEY, dir);
    }

    pub fn get_network(&self) -> Result<Network> {
        match self.get(NETWORK_KEY) {
            Some(name) => name.parse(),
            None => Ok(Network::Mainnet),
        }
    }

    pub fn set_network(&self, network: Network) {
        self.set(NETWORK_KEY, network.to_string());
    }

    pub fn get_config_file(&self) -> Option<PathBuf> {
        self.get(CONFIG_FILE_KEY).map(PathBuf::from)
    }

    pub fn set_config_file(&self, file: String) {
        self.set(CONFIG_FILE_KEY, file);
    }

    /// Chain parameters for the configured network and parameter file
    pub fn load_params(&self) -> Result<ChainParams> {
        let file = self.get_config_file();
        ChainParams::load(self.get_network()?, file.as_deref())
    }
}
