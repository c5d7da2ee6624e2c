//! Data storage and persistence
//!
//! The ledger lives in memory; this module writes it to a sled database so a
//! node can stop and pick up where it left off.

pub mod chain_store;

pub use chain_store::{ChainStore, RootSnapshot};
