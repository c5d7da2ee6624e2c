//! Transaction and block validation
//!
//! Everything here is read-only: a candidate is checked against the MMR of
//! the node it would extend and either passes or is rejected with an error
//! saying why. Nothing is written until every check has passed.

use crate::core::mmr::Mmr;
use crate::core::script::{ScriptContext, ScriptInterpreter};
use crate::core::{
    CoinProof, Hash, Magic, MagicBounds, ProofOfWork, Transaction, TxHeader, TxPoW, Witness,
};
use crate::error::{LedgerError, Result};
use crate::utils::encoded_len;
use log::debug;
use std::collections::HashSet;

/// What a transaction is checked against
pub struct TransactionContext<'a> {
    /// MMR of the node the block extends
    pub mmr: &'a Mmr,
    /// Number of the block being validated
    pub block_number: u64,
    /// Binding capacity for the block
    pub magic: &'a Magic,
    /// Oldest proof age accepted, in blocks
    pub proof_history: u64,
    pub interpreter: &'a dyn ScriptInterpreter,
}

/// Chain-wide rules a header is checked against
pub struct BlockRules<'a> {
    pub chain_id: u8,
    pub cascade_levels: usize,
    pub bounds: &'a MagicBounds,
}

/// Check one transaction and its witness. Returns the script ops used.
///
/// The script op limit from the magic applies to this transaction alone: the
/// ops of every input script and token script are summed here, and a block's
/// main and burn transactions each get their own allowance.
pub fn check_transaction(
    ctx: &TransactionContext<'_>,
    transaction: &Transaction,
    witness: &Witness,
) -> Result<u64> {
    transaction.check_valid()?;

    let inputs = transaction.inputs();
    let coin_proofs = witness.coin_proofs();
    if inputs.len() != coin_proofs.len() {
        return Err(LedgerError::InvalidTransaction(format!(
            "{} inputs but {} coin proofs",
            inputs.len(),
            coin_proofs.len()
        )));
    }

    let transaction_id = transaction.transaction_id()?;
    let signers = witness.verified_signers(&transaction_id)?;
    let mut ops = 0u64;

    for (index, (input, coin_proof)) in inputs.iter().zip(coin_proofs).enumerate() {
        if input != coin_proof.coin() {
            return Err(LedgerError::InvalidTransaction(format!(
                "Coin proof {index} does not prove input {}",
                input.coin_id()
            )));
        }
        check_coin_proof(ctx, coin_proof)?;

        let script_proof = witness.script_for_address(input.address())?.ok_or_else(|| {
            LedgerError::InvalidTransaction(format!(
                "No script for address {} of input {}",
                input.address(),
                input.coin_id()
            ))
        })?;
        ops += run_script(ctx, script_proof.script(), transaction, witness, index, &signers)?;

        if !input.is_native() {
            let token = input.token().ok_or_else(|| {
                LedgerError::InvalidTransaction(format!(
                    "Token input {} carries no token details",
                    input.coin_id()
                ))
            })?;
            ops += run_script(ctx, token.script(), transaction, witness, index, &signers)?;
        }
    }

    // Per transaction, not per block
    let max_ops = ctx.magic.current().max_script_ops();
    if ops > max_ops {
        return Err(LedgerError::InvalidTransaction(format!(
            "Scripts used {ops} ops, limit is {max_ops}"
        )));
    }
    Ok(ops)
}

fn run_script(
    ctx: &TransactionContext<'_>,
    script: &str,
    transaction: &Transaction,
    witness: &Witness,
    input_index: usize,
    signers: &[Vec<u8>],
) -> Result<u64> {
    let context = ScriptContext {
        script,
        transaction,
        witness,
        input_index,
        state: transaction.state(),
        signers,
        block_number: ctx.block_number,
    };
    let outcome = ctx.interpreter.run(&context);
    if !outcome.success {
        return Err(LedgerError::InvalidTransaction(format!(
            "Script for input {input_index} failed: {script}"
        )));
    }
    Ok(outcome.ops)
}

fn check_coin_proof(ctx: &TransactionContext<'_>, coin_proof: &CoinProof) -> Result<()> {
    let coin = coin_proof.coin();
    let proof_time = coin_proof.proof().block_time();

    if proof_time >= ctx.block_number {
        return Err(LedgerError::InvalidTransaction(format!(
            "Proof for coin {} is from block {proof_time}, not before block {}",
            coin.coin_id(),
            ctx.block_number
        )));
    }
    if ctx.block_number - proof_time > ctx.proof_history {
        return Err(LedgerError::InvalidTransaction(format!(
            "Proof for coin {} is {} blocks old, limit is {}",
            coin.coin_id(),
            ctx.block_number - proof_time,
            ctx.proof_history
        )));
    }
    if ctx.mmr.at_block_time(proof_time).is_none() {
        return Err(LedgerError::NotEnoughHistory(format!(
            "No MMR state at block {proof_time} for coin {}",
            coin.coin_id()
        )));
    }
    if coin.is_spent() {
        return Err(LedgerError::InvalidTransaction(format!(
            "Input coin {} is flagged spent",
            coin.coin_id()
        )));
    }

    let data = coin_proof.mmr_data()?;
    if !ctx.mmr.check_proof_time_valid(coin.mmr_entry(), &data, coin_proof.proof()) {
        return Err(LedgerError::InvalidTransaction(format!(
            "Invalid MMR proof for coin {} at entry {}",
            coin.coin_id(),
            coin.mmr_entry()
        )));
    }

    // The proof shows the coin unspent back then. Anything that changed the
    // leaf since is visible here.
    if let Some(current) = ctx.mmr.get_entry(coin.mmr_entry()) {
        if *current != data {
            return Err(LedgerError::InvalidTransaction(format!(
                "Coin {} has been spent",
                coin.coin_id()
            )));
        }
    }
    debug!("Coin proof for {} valid at block {proof_time}", coin.coin_id());
    Ok(())
}

/// A burn transaction, when present, must name the transaction it pays for
pub fn check_burn_link(main: &Transaction, burn: &Transaction) -> Result<()> {
    if burn.is_empty() {
        return Ok(());
    }
    let main_id = main.transaction_id()?;
    if *burn.link_hash() != main_id {
        return Err(LedgerError::InvalidTransaction(format!(
            "Burn transaction links {} instead of {main_id}",
            burn.link_hash()
        )));
    }
    Ok(())
}

/// Check the main and burn transactions a unit carries
pub fn check_txpow_transactions(ctx: &TransactionContext<'_>, txpow: &TxPoW) -> Result<u64> {
    let body = txpow.body();
    let mut ops = 0;
    if !body.transaction().is_empty() {
        ops += check_transaction(ctx, body.transaction(), body.witness())?;
    }
    if !body.burn_transaction().is_empty() {
        if body.transaction().is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Burn transaction without a main transaction".to_string(),
            ));
        }
        check_burn_link(body.transaction(), body.burn_transaction())?;
        ops += check_transaction(ctx, body.burn_transaction(), body.burn_witness())?;
    }
    Ok(ops)
}

/// Header rules a block must satisfy relative to its parent
pub fn check_block_header(
    txpow: &TxPoW,
    parent: &TxHeader,
    parent_id: &Hash,
    rules: &BlockRules<'_>,
) -> Result<()> {
    let header = txpow.header();
    let id = txpow.id()?;

    if header.chain_id() != rules.chain_id {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} is for chain {}, expected {}",
            header.chain_id(),
            rules.chain_id
        )));
    }
    if !txpow.has_body_hash()? {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} body does not match its header"
        )));
    }
    if header.block_number() != parent.block_number() + 1 {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} has number {} but its parent is {}",
            header.block_number(),
            parent.block_number()
        )));
    }

    if header.super_parents().len() != rules.cascade_levels {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} has {} super parents, chain uses {}",
            header.super_parents().len(),
            rules.cascade_levels
        )));
    }
    let parent_level = parent.super_level(rules.cascade_levels)?;
    let expected = parent.super_parents().next(parent_id, parent_level);
    if *header.super_parents() != expected {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} super parents do not follow from parent {parent_id}"
        )));
    }

    let expected_magic = parent
        .magic()
        .next(header.magic().desired().clone(), rules.bounds);
    if !header.magic().check_same(&expected_magic) {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} has the wrong binding magic"
        )));
    }

    let min_work = header.magic().min_work();
    if !min_work.is_met_by(&id) {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} does not meet the minimum work"
        )));
    }
    if header.block_difficulty() > &header.magic().current().min_work {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} difficulty is easier than the minimum work"
        )));
    }
    if !txpow.is_block()? {
        return Err(LedgerError::InvalidBlock(format!(
            "Unit {id} does not meet its block difficulty"
        )));
    }

    let max_txns = header.magic().current().max_txns();
    if txpow.body().txn_list().len() as u64 > max_txns {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} lists {} transactions, limit is {max_txns}",
            txpow.body().txn_list().len()
        )));
    }
    let size = encoded_len(txpow)? as u64;
    let max_size = header.magic().current().max_txpow_size();
    if size > max_size {
        return Err(LedgerError::InvalidBlock(format!(
            "Block {id} is {size} bytes, limit is {max_size}"
        )));
    }
    Ok(())
}

/// Check every transaction a block applies: its own, then each referenced
/// unit in order. No coin may be spent twice within the block.
pub fn check_block_transactions(
    ctx: &TransactionContext<'_>,
    txpow: &TxPoW,
    txns: &[TxPoW],
) -> Result<()> {
    let min_work: ProofOfWork = ctx.magic.min_work();
    let mut ops = check_txpow_transactions(ctx, txpow)?;

    for txn in txns {
        let txn_id = txn.id()?;
        if !min_work.is_met_by(&txn_id) {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction unit {txn_id} does not meet the minimum work"
            )));
        }
        ops += check_txpow_transactions(ctx, txn)?;
    }
    debug!("Block {} scripts used {ops} ops", ctx.block_number);

    let mut seen = HashSet::new();
    let units = std::iter::once(txpow).chain(txns.iter());
    for unit in units {
        let body = unit.body();
        for coin in body
            .transaction()
            .inputs()
            .iter()
            .chain(body.burn_transaction().inputs())
        {
            if !seen.insert(*coin.coin_id()) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Coin {} is spent twice in block {}",
                    coin.coin_id(),
                    ctx.block_number
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::StandardScripts;
    use crate::core::{script_address, Amount, Coin, ScriptProof, TxBody};
    use std::sync::Arc;

    struct Fixture {
        mmr: Mmr,
        coin: Coin,
        proof_mmr: Arc<Mmr>,
        magic: Magic,
    }

    // Coin at entry 0 created at block 3, proofs taken at block 5, validating
    // a block 7 on top of a block 6 layer
    fn fixture() -> Fixture {
        let address = script_address("RETURN TRUE").unwrap();
        let mut coin = Coin::new(Hash::digest(b"input"), address, Amount::from_int(10), Hash::ZERO);
        coin.set_block_created(3);

        let mut base = Mmr::new();
        base.set_block_time(5).unwrap();
        base.add_entry(coin.mmr_data().unwrap()).unwrap();
        base.add_entry(crate::core::mmr::MmrData::leaf(&1u8, &Amount::from_int(1)).unwrap())
            .unwrap();
        base.finalize_set();
        let base = Arc::new(base);

        let mut tip = Mmr::child(&base, 6);
        tip.finalize_set();

        Fixture {
            mmr: tip,
            coin,
            proof_mmr: base,
            // one expected hash per unit, so any id meets the minimum work
            magic: Magic::genesis(&MagicBounds::new(1)),
        }
    }

    fn ctx<'a>(f: &'a Fixture, interpreter: &'a StandardScripts) -> TransactionContext<'a> {
        TransactionContext {
            mmr: &f.mmr,
            block_number: 7,
            magic: &f.magic,
            proof_history: 256,
            interpreter,
        }
    }

    fn spend(f: &Fixture, out: i64) -> (Transaction, Witness) {
        let mut tx = Transaction::new();
        tx.add_input(f.coin.clone());
        tx.add_output(Coin::new_output(Hash::digest(b"X"), Amount::from_int(out), Hash::ZERO));
        let mut witness = Witness::new();
        let proof = f.proof_mmr.get_proof(0).unwrap();
        witness.add_coin_proof(CoinProof::new(f.coin.clone(), proof));
        witness.add_script_proof(ScriptProof::new_single("RETURN TRUE")).unwrap();
        (tx, witness)
    }

    #[test]
    fn test_valid_spend() {
        let f = fixture();
        let interpreter = StandardScripts;
        let (tx, witness) = spend(&f, 7);
        let ops = check_transaction(&ctx(&f, &interpreter), &tx, &witness).unwrap();
        assert_eq!(ops, 1);
        // checking again gives the same answer
        assert!(check_transaction(&ctx(&f, &interpreter), &tx, &witness).is_ok());
    }

    #[test]
    fn test_overspend_rejected() {
        let f = fixture();
        let interpreter = StandardScripts;
        let (tx, witness) = spend(&f, 11);
        let err = check_transaction(&ctx(&f, &interpreter), &tx, &witness).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
    }

    #[test]
    fn test_missing_script_rejected() {
        let f = fixture();
        let interpreter = StandardScripts;
        let (tx, _) = spend(&f, 7);
        let mut witness = Witness::new();
        witness.add_coin_proof(CoinProof::new(f.coin.clone(), f.proof_mmr.get_proof(0).unwrap()));
        witness.add_script_proof(ScriptProof::new_single("RETURN FALSE")).unwrap();
        assert!(check_transaction(&ctx(&f, &interpreter), &tx, &witness).is_err());
    }

    #[test]
    fn test_forged_proof_rejected() {
        let f = fixture();
        let interpreter = StandardScripts;
        let mut richer = f.coin.clone();
        richer = Coin::new(*richer.coin_id(), *richer.address(), Amount::from_int(20), Hash::ZERO);
        richer.set_block_created(3);

        let mut tx = Transaction::new();
        tx.add_input(richer.clone());
        tx.add_output(Coin::new_output(Hash::digest(b"X"), Amount::from_int(20), Hash::ZERO));
        let mut witness = Witness::new();
        witness.add_coin_proof(CoinProof::new(richer, f.proof_mmr.get_proof(0).unwrap()));
        witness.add_script_proof(ScriptProof::new_single("RETURN TRUE")).unwrap();
        assert!(check_transaction(&ctx(&f, &interpreter), &tx, &witness).is_err());
    }

    #[test]
    fn test_spent_coin_rejected() {
        let f = fixture();
        let mut spent_layer = Mmr::child(&f.proof_mmr, 6);
        let proof = f.proof_mmr.get_proof_to_peak(0).unwrap();
        spent_layer
            .update_entry(0, &proof, f.coin.to_spent().mmr_data().unwrap())
            .unwrap();
        spent_layer.finalize_set();
        let f = Fixture {
            mmr: spent_layer,
            ..f
        };

        let interpreter = StandardScripts;
        let (tx, witness) = spend(&f, 7);
        assert!(check_transaction(&ctx(&f, &interpreter), &tx, &witness).is_err());
    }

    #[test]
    fn test_stale_proof_rejected() {
        let f = fixture();
        let interpreter = StandardScripts;
        let (tx, witness) = spend(&f, 7);
        let mut context = ctx(&f, &interpreter);
        context.proof_history = 1;
        assert!(check_transaction(&context, &tx, &witness).is_err());
    }

    #[test]
    fn test_burn_link() {
        let f = fixture();
        let (main, _) = spend(&f, 7);
        let mut burn = Transaction::new();
        burn.add_input(Coin::new(Hash::digest(b"b"), Hash::ZERO, Amount::from_int(1), Hash::ZERO));
        assert!(check_burn_link(&main, &burn).is_err());
        burn.set_link_hash(main.transaction_id().unwrap());
        assert!(check_burn_link(&main, &burn).is_ok());
        assert!(check_burn_link(&main, &Transaction::new()).is_ok());
    }

    #[test]
    fn test_script_ops_limit_is_per_transaction() {
        let mut f = fixture();
        let mut values = f.magic.current().clone();
        values.max_script_ops = Amount::from_int(1);
        f.magic = Magic::new(values.clone(), values);
        let interpreter = StandardScripts;
        let context = ctx(&f, &interpreter);

        // main and burn each run one op, two in total, under a limit of one
        let (main, witness) = spend(&f, 7);
        let (mut burn, burn_witness) = spend(&f, 9);
        burn.set_link_hash(main.transaction_id().unwrap());
        let body = TxBody::new(main, witness).with_burn(burn, burn_witness);
        let header = TxHeader::new(
            2,
            7,
            0,
            Hash::MAX,
            crate::core::SuperParents::genesis(4),
            f.magic.clone(),
        );
        let txpow = TxPoW::new(header, body).unwrap();
        assert_eq!(check_txpow_transactions(&context, &txpow).unwrap(), 2);

        // one op alone goes over a limit of zero
        let mut values = f.magic.current().clone();
        values.max_script_ops = Amount::from_int(0);
        f.magic = Magic::new(values.clone(), values);
        let (tx, witness) = spend(&f, 7);
        let err = check_transaction(&ctx(&f, &interpreter), &tx, &witness).unwrap_err();
        assert!(err.to_string().contains("limit is 0"));
    }

    #[test]
    fn test_double_spend_within_block() {
        let f = fixture();
        let interpreter = StandardScripts;
        let (tx, witness) = spend(&f, 7);
        let header = TxHeader::new(
            2,
            7,
            0,
            Hash::MAX,
            crate::core::SuperParents::genesis(4),
            f.magic.clone(),
        );
        let block = TxPoW::new(header.clone(), TxBody::new(tx.clone(), witness.clone())).unwrap();
        let txn = TxPoW::new(header, TxBody::new(tx, witness)).unwrap();

        let context = ctx(&f, &interpreter);
        assert!(check_block_transactions(&context, &block, &[]).is_ok());
        assert!(check_block_transactions(&context, &block, &[txn]).is_err());
    }
}
