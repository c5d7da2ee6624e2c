//! Genesis construction
//!
//! The first block is built, not mined. Block 0 exists only as a one-leaf MMR
//! holding the genesis coin; block 1 spends that coin with a `RETURN TRUE`
//! script and pays the full native supply to the genesis address.

use crate::core::mmr::Mmr;
use crate::core::{
    script_address, Amount, Coin, CoinProof, Hash, Magic, MagicBounds, ScriptProof, SuperParents,
    Transaction, TxBlock, TxBody, TxHeader, TxPoW, Witness,
};
use crate::error::Result;
use log::info;
use std::sync::Arc;

pub const GENESIS_BLOCK_NUMBER: u64 = 1;

/// Script locking the genesis coin
pub const GENESIS_SCRIPT: &str = "RETURN TRUE";

const GENESIS_NONCE: u64 = 256;

pub struct Genesis {
    pub txpow: TxPoW,
    pub txblock: TxBlock,
    /// The block 0 accumulator the genesis block spends from
    pub base_mmr: Arc<Mmr>,
}

pub fn genesis_coin() -> Result<Coin> {
    Ok(Coin::new(
        Hash::ZERO,
        script_address(GENESIS_SCRIPT)?,
        Amount::max_native(),
        Hash::ZERO,
    ))
}

/// One unspent leaf at block time 0
pub fn genesis_mmr() -> Result<Arc<Mmr>> {
    let mut mmr = Mmr::new();
    mmr.add_entry(genesis_coin()?.mmr_data()?)?;
    mmr.finalize_set();
    Ok(Arc::new(mmr))
}

pub fn build_genesis(
    chain_id: u8,
    cascade_levels: usize,
    time_milli: u64,
    genesis_address: Hash,
    bounds: &MagicBounds,
) -> Result<Genesis> {
    let base_mmr = genesis_mmr()?;
    let coin = genesis_coin()?;

    let mut transaction = Transaction::new();
    transaction.add_input(coin.clone());
    transaction.add_output(Coin::new_output(genesis_address, Amount::max_native(), Hash::ZERO));

    let mut witness = Witness::new();
    witness.add_coin_proof(CoinProof::new(coin, base_mmr.get_proof_to_peak(0)?));
    witness.add_script_proof(ScriptProof::new_single(GENESIS_SCRIPT))?;

    let mut header = TxHeader::new(
        chain_id,
        GENESIS_BLOCK_NUMBER,
        time_milli,
        Hash::MAX,
        SuperParents::genesis(cascade_levels),
        Magic::genesis(bounds),
    );
    header.set_nonce(GENESIS_NONCE);
    let mut txpow = TxPoW::new(header, TxBody::new(transaction, witness))?;

    // The header commits to the MMR the block produces, so the block is
    // applied once to learn the root, then built again with it in place.
    let (draft, _) = TxBlock::build(&base_mmr, &txpow, &[])?;
    let root = draft.apply(&base_mmr)?.mmr.get_root()?;
    txpow
        .header_mut()
        .set_mmr(*root.hash(), root.value().clone());

    let (txblock, _) = TxBlock::build(&base_mmr, &txpow, &[])?;
    info!("Genesis block created : {}", txpow.id()?);

    Ok(Genesis {
        txpow,
        txblock,
        base_mmr,
    })
}
