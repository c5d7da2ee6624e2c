//! Core ledger functionality
//!
//! This module contains the consensus objects and the rules that tie them
//! together: hashes and amounts, the MMR accumulator, coins and transactions,
//! TxPoW units, the block state transition, Magic and validation.

pub mod amount;
pub mod coin;
pub mod genesis;
pub mod hash;
pub mod header;
pub mod magic;
pub mod mmr;
pub mod proof_of_work;
pub mod script;
pub mod state;
pub mod token;
pub mod transaction;
pub mod txblock;
pub mod txpow;
pub mod validation;
pub mod witness;

pub use amount::{Amount, DECIMAL_PLACES, MAX_NATIVE_COINS};
pub use coin::Coin;
pub use genesis::{build_genesis, Genesis, GENESIS_BLOCK_NUMBER};
pub use hash::Hash;
pub use header::{SuperParents, TxHeader, MAX_CASCADE_LEVELS};
pub use magic::{Magic, MagicBounds, MagicValues};
pub use mmr::{Mmr, MmrData, MmrPeak, MmrProof};
pub use proof_of_work::ProofOfWork;
pub use script::{
    signed_by_script, ScriptContext, ScriptInterpreter, ScriptOutcome, StandardScripts,
};
pub use state::{StateKind, StateVariable};
pub use token::Token;
pub use transaction::{calculate_coin_id, Transaction};
pub use txblock::{AppliedBlock, StateNotifications, TxBlock};
pub use txpow::{TxBody, TxPoW};
pub use witness::{script_address, script_leaf, CoinProof, ScriptProof, Signature, Witness};
