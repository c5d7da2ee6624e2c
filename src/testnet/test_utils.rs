//! Helpers for building devnet chains in tests

use crate::chain::{ApplyOutcome, Ledger};
use crate::config::ChainParams;
use crate::core::genesis::GENESIS_SCRIPT;
use crate::core::{
    calculate_coin_id, Amount, Coin, Hash, ScriptProof, StandardScripts, Transaction, TxBody,
    TxPoW, Witness,
};
use crate::error::{LedgerError, Result};
use crate::storage::ChainStore;
use crate::wallet::{NoWallet, Wallet, WalletView};
use std::path::Path;
use std::sync::Arc;

/// Milliseconds between consecutive test blocks
pub const BLOCK_GAP: u64 = 1_000;

pub fn devnet_ledger() -> Result<Ledger> {
    devnet_ledger_with(Arc::new(NoWallet))
}

pub fn devnet_ledger_with(wallet: Arc<dyn WalletView>) -> Result<Ledger> {
    Ledger::create(
        ChainParams::devnet()?,
        None,
        Arc::new(StandardScripts),
        wallet,
    )
}

/// A devnet ledger saving to `path`, with a second handle on its store
pub fn stored_devnet_ledger(path: &Path) -> Result<(Ledger, ChainStore)> {
    let store = ChainStore::open(path)?;
    let ledger = Ledger::create(
        ChainParams::devnet()?,
        Some(store.clone()),
        Arc::new(StandardScripts),
        Arc::new(NoWallet),
    )?;
    Ok((ledger, store))
}

/// Bump the nonce until the unit is a block
pub fn seal(mut txpow: TxPoW) -> Result<TxPoW> {
    while !txpow.is_block()? {
        let nonce = txpow.header().nonce() + 1;
        txpow.header_mut().set_nonce(nonce);
    }
    Ok(txpow)
}

/// A sealed block on `parent` carrying `body`. `salt` makes sibling blocks
/// with the same body distinct.
pub fn block_on(ledger: &Ledger, parent: &Hash, body: TxBody, salt: u64) -> Result<TxPoW> {
    let time = ledger
        .block(parent)?
        .map(|info| info.header.time_milli())
        .unwrap_or(0);
    let txpow = ledger.block_template_on(parent, body, None, time + BLOCK_GAP + salt)?;
    seal(txpow)
}

pub fn mine(ledger: &Ledger, body: TxBody) -> Result<ApplyOutcome> {
    let tip = ledger.tip()?.id;
    let txpow = block_on(ledger, &tip, body, 0)?;
    ledger.apply_block(txpow)
}

pub fn mine_empty(ledger: &Ledger, count: usize) -> Result<Vec<Hash>> {
    (0..count)
        .map(|_| mine(ledger, TxBody::empty()).map(|outcome| outcome.id))
        .collect()
}

/// The coin holding the whole genesis allocation, while it is unspent
pub fn genesis_output(ledger: &Ledger) -> Result<Coin> {
    let genesis = ledger
        .main_chain()?
        .last()
        .map(|info| info.id)
        .ok_or_else(|| LedgerError::Consistency("Empty chain".to_string()))?;
    let txpow = ledger
        .txpow(&genesis)?
        .ok_or_else(|| LedgerError::Consistency("Genesis missing".to_string()))?;
    let base = txpow.body().transaction().transaction_id()?;
    let coin_id = calculate_coin_id(&base, 0);
    ledger
        .find_coin(&coin_id)?
        .ok_or_else(|| LedgerError::ProofUnavailable(format!("Genesis coin {coin_id} is spent")))
}

/// Spend `coin` under `script`, paying `amount` to `to` and the rest back to
/// the coin's address
pub fn spend_body(
    ledger: &Ledger,
    coin: &Coin,
    script: &str,
    signer: Option<&Wallet>,
    to: Hash,
    amount: i64,
) -> Result<TxBody> {
    let proof = ledger.coin_proof(coin.coin_id())?;
    let mut transaction = Transaction::new();
    transaction.add_input(proof.coin().clone());
    let amount = Amount::from_int(amount);
    let change = coin.amount().clone() - amount.clone();
    transaction.add_output(Coin::new_output(to, amount, Hash::ZERO));
    if !change.is_zero() {
        transaction.add_output(Coin::new_output(*coin.address(), change, Hash::ZERO));
    }

    let mut witness = Witness::new();
    witness.add_coin_proof(proof);
    witness.add_script_proof(ScriptProof::new_single(script))?;
    if let Some(wallet) = signer {
        witness.add_signature(wallet.sign(&transaction.transaction_id()?)?);
    }
    Ok(TxBody::new(transaction, witness))
}

/// Move `amount` out of the genesis coin
pub fn spend_genesis(ledger: &Ledger, to: Hash, amount: i64) -> Result<TxBody> {
    let coin = genesis_output(ledger)?;
    spend_body(ledger, &coin, GENESIS_SCRIPT, None, to, amount)
}
