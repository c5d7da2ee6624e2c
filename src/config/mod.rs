//! Configuration management
//!
//! `params` holds the consensus parameters a chain is opened with. `settings`
//! holds node-local settings such as the data directory.

pub mod params;
pub mod settings;

pub use params::{ChainParams, Network, ParamOverrides};
pub use settings::{Config, GLOBAL_CONFIG};
