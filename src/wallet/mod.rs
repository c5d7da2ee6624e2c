//! Wallet hook and key management
//!
//! The ledger only asks the wallet one question: does this coin belong to
//! us? Relevant coins keep their MMR paths through cascades so the node can
//! always prove them. The built-in [`AddressBook`] answers from its own keys
//! and a list of watched addresses.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

use crate::core::Coin;

pub use wallet::Wallet;
pub use wallets::{AddressBook, WALLET_FILE};

pub trait WalletView: Send + Sync {
    fn is_relevant(&self, coin: &Coin) -> bool;
}

/// Treats nothing as relevant
pub struct NoWallet;

impl WalletView for NoWallet {
    fn is_relevant(&self, _coin: &Coin) -> bool {
        false
    }
}
