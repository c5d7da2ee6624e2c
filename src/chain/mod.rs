//! Chain management
//!
//! Blocks above the root live in a [`TxPowTree`] where the heaviest branch is
//! the main chain. Once the tree is deep enough the oldest main-chain blocks
//! are cut away: their headers go onto the [`Cascade`] and the root's MMR is
//! collapsed. [`Ledger`] owns both behind one lock.

pub mod cascade;
pub mod ledger;
pub mod tree;

pub use cascade::{Cascade, CascadeNode};
pub use ledger::{
    ApplyOutcome, BlockInfo, ChainStatus, ChainSummary, CoinNotification, Ledger, Reorg,
};
pub use tree::{BlockStatus, TreeNode, TxPowTree};
