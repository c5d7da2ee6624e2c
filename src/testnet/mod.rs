//! Devnet test harness
//!
//! Devnet's work target is the whole hash space, so every nonce seals a block
//! and tests can build long chains instantly.

pub mod test_utils;

pub use test_utils::*;
