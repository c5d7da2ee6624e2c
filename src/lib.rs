//! # Cascade Chain - A UTXO ledger core with cascading finality
//!
//! This is the ledger half of a node: it validates blocks, keeps the coin set
//! in a Merkle Mountain Range and forgets old history without losing the
//! ability to prove what matters. Networking and mining live elsewhere.
//!
//! ## What I Built
//! - **MMR accumulator**: copy-on-write layers per block, proofs to peaks,
//!   collapse that keeps only the paths a wallet still needs
//! - **Ledger entities**: coins, tokens, state variables, transactions and
//!   witnesses, all hashed over one bincode encoding
//! - **Block processing**: header rules, transaction checks against the
//!   parent MMR, the state transition that spends and creates coins
//! - **Chain tree**: every known block above the root, heaviest branch wins,
//!   ties go to the block seen first
//! - **Cascade**: old headers thinned by super level so total work stays
//!   provable long after the blocks are gone
//! - **Magic**: block limits and work target that drift towards what miners
//!   ask for, one small step per block
//!
//! ## How I Organized My Code
//! - `core/`: entities, the MMR, validation and the block state transition
//! - `chain/`: the block tree, the cascade and the [`Ledger`] handle
//! - `storage/`: the sled database a node restarts from
//! - `wallet/`: which coins are ours and the keys that spend them
//! - `config/`: per-network chain parameters and node settings
//! - `utils/`: hashing, signatures and the byte encoding
//! - `cli/`: argument parsing for the node binary
//!
//! ## When I Need to Understand Something
//! 1. Start with `chain/ledger.rs` to see how a block is applied
//! 2. Look at `core/validation.rs` for every rule a block must pass
//! 3. Check `core/mmr/accumulator.rs` for how proofs survive a cascade
//! 4. Review `chain/cascade.rs` for when and how the root moves

pub mod chain;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use chain::{
    ApplyOutcome, BlockInfo, BlockStatus, Cascade, CascadeNode, ChainStatus, ChainSummary,
    CoinNotification, Ledger, Reorg, TreeNode, TxPowTree,
};
pub use cli::{Command, Opt};
pub use config::{ChainParams, Config, Network, ParamOverrides, GLOBAL_CONFIG};
pub use core::{
    Amount, Coin, CoinProof, Hash, Magic, MagicBounds, MagicValues, Mmr, MmrData, MmrProof,
    ScriptInterpreter, ScriptProof, StandardScripts, StateVariable, Token, Transaction, TxBlock,
    TxBody, TxHeader, TxPoW, Witness,
};
pub use error::{ErrorKind, LedgerError, Result};
pub use storage::{ChainStore, RootSnapshot};
pub use wallet::{AddressBook, NoWallet, Wallet, WalletView};
