//! Block state transition
//!
//! A [`TxBlock`] is computed once per block from the parent's MMR and the
//! block's transactions. It lists every coin the block spends (with a proof
//! against the parent's peaks) and every coin it creates (with its final id).
//! Applying it to the parent MMR gives the block's own MMR.

use crate::core::genesis::GENESIS_BLOCK_NUMBER;
use crate::core::mmr::{Mmr, MmrPeak};
use crate::core::transaction::calculate_coin_id;
use crate::core::{Coin, CoinProof, Hash, StateVariable, Transaction, TxPoW, Witness};
use crate::error::{LedgerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// State variables of outputs that do not store state, by coin id. Handed to
/// the wallet when the block is applied and never committed.
pub type StateNotifications = Vec<(Hash, Vec<StateVariable>)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxBlock {
    txpow: TxPoW,
    previous_peaks: Vec<MmrPeak>,
    spent_coins: Vec<CoinProof>,
    new_coins: Vec<Coin>,
}

/// Result of applying a [`TxBlock`] on top of its parent's MMR
pub struct AppliedBlock {
    pub mmr: Mmr,
    /// Spent coins, flagged spent
    pub spent: Vec<Coin>,
    /// Created coins with their entry numbers and creation height set
    pub created: Vec<Coin>,
}

struct Builder {
    working: Mmr,
    block_number: u64,
    spent_coins: Vec<CoinProof>,
    new_coins: Vec<Coin>,
    notifications: StateNotifications,
}

impl Builder {
    fn process(&mut self, transaction: &Transaction, witness: &Witness) -> Result<()> {
        if transaction.is_empty() {
            return Ok(());
        }

        for coin_proof in witness.coin_proofs() {
            let entry = coin_proof.coin().mmr_entry();
            self.working
                .update_entry(entry, coin_proof.proof(), coin_proof.mmr_data()?)?;
            let proof = self.working.get_proof_to_peak(entry)?;
            self.spent_coins
                .push(CoinProof::new(coin_proof.coin().clone(), proof));
        }

        let genesis = self.block_number == GENESIS_BLOCK_NUMBER;
        let base = transaction.base_coin_id(genesis)?;

        for (index, output) in transaction.outputs().iter().enumerate() {
            let coin_id = calculate_coin_id(&base, index as u64);
            let mut coin = output.clone();
            coin.set_coin_id(coin_id);

            if coin.store_state() {
                coin.set_state(transaction.state().to_vec());
            } else {
                coin.set_state(Vec::new());
                if !transaction.state().is_empty() {
                    self.notifications
                        .push((coin_id, transaction.state().to_vec()));
                }
            }

            if coin.is_token_create() {
                let template = coin.token().cloned().ok_or_else(|| {
                    LedgerError::InvalidTransaction(format!(
                        "Token creation output {coin_id} has no token details"
                    ))
                })?;
                let token = template.minted(coin_id, coin.amount().clone(), self.block_number);
                coin.set_token_id(token.token_id()?);
                coin.set_token(Some(token));
            }

            self.new_coins.push(coin);
        }
        Ok(())
    }
}

impl TxBlock {
    /// Run every transaction of `txpow` against a copy of `parent`: the main
    /// transaction, the burn transaction, then each referenced unit in the
    /// order the body lists them. `txns` must hold every referenced unit.
    pub fn build(
        parent: &Arc<Mmr>,
        txpow: &TxPoW,
        txns: &[TxPoW],
    ) -> Result<(TxBlock, StateNotifications)> {
        let mut by_id = HashMap::new();
        for txn in txns {
            by_id.insert(txn.id()?, txn);
        }

        let mut referenced = Vec::with_capacity(txpow.body().txn_list().len());
        for id in txpow.body().txn_list() {
            let txn = by_id.get(id).ok_or_else(|| {
                LedgerError::Consistency(format!(
                    "TxBlock creation with missing transaction {id}"
                ))
            })?;
            referenced.push(*txn);
        }

        let block_number = txpow.block_number();
        let mut builder = Builder {
            working: Mmr::child(parent, block_number),
            block_number,
            spent_coins: Vec::new(),
            new_coins: Vec::new(),
            notifications: Vec::new(),
        };

        let body = txpow.body();
        builder.process(body.transaction(), body.witness())?;
        builder.process(body.burn_transaction(), body.burn_witness())?;
        for txn in referenced {
            builder.process(txn.body().transaction(), txn.body().witness())?;
            builder.process(txn.body().burn_transaction(), txn.body().burn_witness())?;
        }

        debug!(
            "Built TxBlock {}: {} spent, {} created",
            block_number,
            builder.spent_coins.len(),
            builder.new_coins.len()
        );

        Ok((
            TxBlock {
                txpow: txpow.clone(),
                previous_peaks: parent.get_peaks()?,
                spent_coins: builder.spent_coins,
                new_coins: builder.new_coins,
            },
            builder.notifications,
        ))
    }

    /// Mark the spent coins and append the new ones on a layer over `parent`.
    /// The returned MMR is finalized.
    pub fn apply(&self, parent: &Arc<Mmr>) -> Result<AppliedBlock> {
        let block_number = self.txpow.block_number();
        let mut mmr = Mmr::child(parent, block_number);

        let mut spent = Vec::with_capacity(self.spent_coins.len());
        for coin_proof in &self.spent_coins {
            let spent_coin = coin_proof.coin().to_spent();
            mmr.update_entry(spent_coin.mmr_entry(), coin_proof.proof(), spent_coin.mmr_data()?)?;
            spent.push(spent_coin);
        }

        let mut created = Vec::with_capacity(self.new_coins.len());
        for coin in &self.new_coins {
            let mut coin = coin.clone();
            coin.set_mmr_entry(mmr.entry_count());
            coin.set_block_created(block_number);
            coin.set_spent(false);
            mmr.add_entry(coin.mmr_data()?)?;
            created.push(coin);
        }

        mmr.finalize_set();
        Ok(AppliedBlock {
            mmr,
            spent,
            created,
        })
    }

    pub fn txpow(&self) -> &TxPoW {
        &self.txpow
    }

    pub fn previous_peaks(&self) -> &[MmrPeak] {
        &self.previous_peaks
    }

    pub fn spent_coins(&self) -> &[CoinProof] {
        &self.spent_coins
    }

    pub fn new_coins(&self) -> &[Coin] {
        &self.new_coins
    }
}
