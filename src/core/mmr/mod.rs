//! Merkle Mountain Range accumulator
//!
//! The MMR commits to every coin the chain has ever created. Leaves are
//! appended in creation order and updated in place when a coin is spent (its
//! leaf is rewritten with value zero). Each inner node carries the sum of the
//! values below it, so the root also commits to the total unspent amount.

pub mod accumulator;
pub mod data;
pub mod proof;

pub use accumulator::{Mmr, MmrPeak, MmrPosition, MmrSnapshot};
pub use data::MmrData;
pub use proof::{MmrProof, ProofChunk};
