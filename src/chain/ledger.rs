// This is the ledger handle - the one object the rest of a node talks to.
// I keep all chain state behind a single RwLock: block application takes the
// write lock for the whole block, everything else reads. Once a consistency
// check fails I stop accepting blocks until the node is restarted.

use crate::chain::cascade::{advance_root, check_cascade_invariant, Cascade};
use crate::chain::tree::{BlockStatus, TreeNode, TxPowTree};
use crate::config::ChainParams;
use crate::core::mmr::Mmr;
use crate::core::validation::{
    check_block_header, check_block_transactions, BlockRules, TransactionContext,
};
use crate::core::{
    build_genesis, Coin, CoinProof, Hash, MagicBounds, MagicValues, ScriptInterpreter,
    StateNotifications, TxBlock, TxBody, TxHeader, TxPoW,
};
use crate::error::{LedgerError, Result};
use crate::storage::{ChainStore, RootSnapshot};
use crate::wallet::WalletView;
use log::{debug, error, info, warn};
use num_bigint::BigUint;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A coin a block created or spent, and whether the wallet cares about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinNotification {
    pub coin: Coin,
    pub relevant: bool,
}

/// How the tip moved. A plain extension has nothing disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reorg {
    pub old_tip: Hash,
    pub new_tip: Hash,
    pub common_ancestor: Hash,
    /// Blocks leaving the main chain, newest first
    pub disconnected: Vec<Hash>,
    /// Blocks joining the main chain, oldest first
    pub connected: Vec<Hash>,
}

impl Reorg {
    pub fn is_extension(&self) -> bool {
        self.disconnected.is_empty()
    }
}

pub struct ApplyOutcome {
    pub id: Hash,
    pub block_number: u64,
    pub notifications: Vec<CoinNotification>,
    /// State of outputs that do not store it, handed over once
    pub state: StateNotifications,
    pub reorg: Option<Reorg>,
    /// True if the root moved and headers were finalized
    pub cascaded: bool,
}

#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub id: Hash,
    pub header: TxHeader,
    pub total_weight: BigUint,
    pub status: BlockStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub network: String,
    pub chain_id: u8,
    pub tip_id: Hash,
    pub tip_block: u64,
    pub root_id: Hash,
    pub root_block: u64,
    pub tree_size: usize,
    pub cascade_len: usize,
    pub cascade_tip: Option<u64>,
    /// Cascade weight plus the tip's weight above the root, in decimal
    pub chain_weight: String,
    pub halted: bool,
}

/// What a syncing peer needs to find where it diverges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub struct ChainSummary {
    pub tip_block: u64,
    /// Main chain ids from the tip down to the root
    pub ids: Vec<Hash>,
}

pub struct LedgerState {
    params: ChainParams,
    bounds: MagicBounds,
    tree: TxPowTree,
    cascade: Cascade,
    /// Relevant unspent coins as of the root, the root's own block included
    root_coins: Vec<Coin>,
    /// Transaction units blocks may reference
    txns: HashMap<Hash, TxPoW>,
    halted: bool,
}

#[derive(Clone)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
    interpreter: Arc<dyn ScriptInterpreter>,
    wallet: Arc<dyn WalletView>,
    store: Option<ChainStore>,
}

fn apply_relevant(coins: &mut Vec<Coin>, node: &TreeNode) {
    let spent: HashSet<&Hash> = node.relevant_spent().iter().collect();
    coins.retain(|coin| !spent.contains(coin.coin_id()));
    coins.extend(node.relevant_created().iter().cloned());
}

/// Referenced units from memory, falling back to units stored by an earlier run
fn gather_txns(
    known: &HashMap<Hash, TxPoW>,
    store: Option<&ChainStore>,
    ids: &[Hash],
) -> Result<Vec<TxPoW>> {
    let mut txns = Vec::with_capacity(ids.len());
    for id in ids {
        let stored = match (known.get(id), store) {
            (Some(txn), _) => Some(txn.clone()),
            (None, Some(store)) => store.get_txpow(id)?,
            (None, None) => None,
        };
        txns.push(stored.ok_or(LedgerError::MissingTransaction(*id))?);
    }
    Ok(txns)
}

/// True if no block above the root can include `txn` any more: one of its
/// proofs is too old for the next block, or one of its inputs is in `spent`
fn is_stale_unit(
    txn: &TxPoW,
    next_block: u64,
    proof_history: u64,
    spent: &HashSet<Hash>,
) -> bool {
    let body = txn.body();
    body.witness()
        .coin_proofs()
        .iter()
        .chain(body.burn_witness().coin_proofs())
        .any(|coin_proof| {
            next_block.saturating_sub(coin_proof.proof().block_time()) > proof_history
                || spent.contains(coin_proof.coin().coin_id())
        })
}

/// Drop units that went stale once `pruned` was finalized, unless a block
/// still in the tree references them
fn evict_stale_units(
    tree: &TxPowTree,
    pruned: &[TreeNode],
    txns: &mut HashMap<Hash, TxPoW>,
    proof_history: u64,
) -> Result<Vec<Hash>> {
    let next_block = tree.root()?.block_number() + 1;
    let spent: HashSet<Hash> = pruned
        .iter()
        .flat_map(|node| node.txblock().spent_coins())
        .map(|coin_proof| *coin_proof.coin().coin_id())
        .collect();
    let referenced: HashSet<Hash> = tree
        .nodes()
        .flat_map(|node| node.txblock().txpow().body().txn_list().iter().copied())
        .collect();

    let evicted: Vec<Hash> = txns
        .iter()
        .filter(|(id, txn)| {
            !referenced.contains(*id) && is_stale_unit(txn, next_block, proof_history, &spent)
        })
        .map(|(id, _)| *id)
        .collect();
    for id in &evicted {
        txns.remove(id);
    }
    if !evicted.is_empty() {
        debug!("Evicted {} stale transaction units", evicted.len());
    }
    Ok(evicted)
}

impl Ledger {
    /// Start a new chain from the genesis block `params` describe
    pub fn create(
        params: ChainParams,
        store: Option<ChainStore>,
        interpreter: Arc<dyn ScriptInterpreter>,
        wallet: Arc<dyn WalletView>,
    ) -> Result<Ledger> {
        params.validate()?;
        if let Some(store) = &store {
            if store.has_chain()? {
                return Err(LedgerError::Config(format!(
                    "A chain already exists in {}",
                    store.get_db_path().display()
                )));
            }
        }

        let bounds = params.magic_bounds();
        let genesis = build_genesis(
            params.chain_id,
            params.cascade_levels,
            params.genesis_time,
            params.genesis_address,
            &bounds,
        )?;
        let applied = genesis.txblock.apply(&genesis.base_mmr)?;
        let relevant: Vec<Coin> = applied
            .created
            .iter()
            .filter(|coin| wallet.is_relevant(coin))
            .cloned()
            .collect();
        let id = genesis.txpow.id()?;
        let root = TreeNode::new(id, genesis.txblock, applied.mmr, applied.created)
            .with_relevant(relevant.clone(), Vec::new());

        if let Some(store) = &store {
            store.save_params(&params)?;
            let snapshot = RootSnapshot {
                txblock: root.txblock().clone(),
                mmr: root.mmr().to_snapshot(),
                coins: relevant.clone(),
            };
            store.save_root(&snapshot, &Cascade::new(), &[])?;
        }
        info!("Created {} chain with genesis {id}", params.network);

        let state = LedgerState {
            params,
            bounds,
            tree: TxPowTree::new(root),
            cascade: Cascade::new(),
            root_coins: relevant,
            txns: HashMap::new(),
            halted: false,
        };
        Ok(Ledger {
            state: Arc::new(RwLock::new(state)),
            interpreter,
            wallet,
            store,
        })
    }

    /// Reopen a chain: load the root and cascade, then replay every block
    /// saved above the root
    pub fn open(
        store: ChainStore,
        interpreter: Arc<dyn ScriptInterpreter>,
        wallet: Arc<dyn WalletView>,
    ) -> Result<Ledger> {
        let params = store.load_params()?.ok_or_else(|| {
            LedgerError::Config(format!(
                "No chain found in {}. Create one first.",
                store.get_db_path().display()
            ))
        })?;
        let snapshot = store
            .load_root()?
            .ok_or_else(|| LedgerError::Consistency("Chain has params but no root".to_string()))?;
        let cascade = store.load_cascade()?;

        let id = snapshot.txblock.txpow().id()?;
        let mmr = Mmr::from_snapshot(snapshot.mmr);
        let root = TreeNode::new(id, snapshot.txblock, mmr, Vec::new());
        let tree = TxPowTree::new(root);
        check_cascade_invariant(&tree, &cascade)?;

        let state = LedgerState {
            bounds: params.magic_bounds(),
            params,
            tree,
            cascade,
            root_coins: snapshot.coins,
            txns: HashMap::new(),
            halted: false,
        };
        let ledger = Ledger {
            state: Arc::new(RwLock::new(state)),
            interpreter,
            wallet,
            store: Some(store),
        };
        ledger.replay()?;
        Ok(ledger)
    }

    fn replay(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let ids = store.load_block_ids()?;
        let mut state = self.write()?;
        for id in &ids {
            let txpow = store
                .get_txpow(id)?
                .ok_or_else(|| LedgerError::Consistency(format!("Saved block {id} is missing")))?;
            match self.apply_locked(&mut state, txpow, false) {
                Ok(_) | Err(LedgerError::AlreadyKnown(_)) => {}
                Err(e) => return Err(e),
            }
        }

        // Whatever else is stored is a unit no block has used yet
        let LedgerState { tree, txns, .. } = &mut *state;
        for txpow in store.load_txpows()? {
            let id = txpow.id()?;
            if !tree.contains(&id) && !txpow.body().transaction().is_empty() {
                txns.insert(id, txpow);
            }
        }
        info!(
            "Replayed {} blocks and {} units, tip is block {}",
            ids.len(),
            txns.len(),
            tree.tip()?.block_number()
        );
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Consistency("Ledger lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Consistency("Ledger lock poisoned".to_string()))
    }

    pub fn params(&self) -> Result<ChainParams> {
        Ok(self.read()?.params.clone())
    }

    pub fn is_halted(&self) -> Result<bool> {
        Ok(self.read()?.halted)
    }

    /// Make a transaction unit available to blocks that reference it
    pub fn add_txn(&self, txpow: TxPoW) -> Result<Hash> {
        if txpow.body().transaction().is_empty() {
            return Err(LedgerError::Malformed(
                "Transaction unit carries no transaction".to_string(),
            ));
        }
        let id = txpow.id()?;
        if let Some(store) = &self.store {
            store.put_txpow(&txpow)?;
        }
        self.write()?.txns.insert(id, txpow);
        Ok(id)
    }

    /// Validate `txpow` against its parent and, if it passes, add it to the
    /// tree, move the tip and run the cascade
    pub fn apply_block(&self, txpow: TxPoW) -> Result<ApplyOutcome> {
        let mut state = self.write()?;
        if state.halted {
            return Err(LedgerError::Halted(
                "Ledger stopped after a consistency failure".to_string(),
            ));
        }

        let result = self.apply_locked(&mut state, txpow, true);
        if let Err(e) = &result {
            if e.is_fatal() {
                error!("Consistency failure, ledger halted: {e}");
                state.halted = true;
            } else {
                warn!("Rejected block: {e}");
            }
        }
        result
    }

    fn apply_locked(
        &self,
        state: &mut LedgerState,
        txpow: TxPoW,
        persist: bool,
    ) -> Result<ApplyOutcome> {
        let id = txpow.id()?;
        if state.tree.contains(&id) || state.cascade.contains(&id) {
            return Err(LedgerError::AlreadyKnown(id));
        }
        let parent_id = txpow.parent_id();
        let parent = state
            .tree
            .get(&parent_id)
            .ok_or(LedgerError::UnknownParent(parent_id))?;

        let rules = BlockRules {
            chain_id: state.params.chain_id,
            cascade_levels: state.params.cascade_levels,
            bounds: &state.bounds,
        };
        check_block_header(&txpow, parent.header(), &parent_id, &rules)?;

        let txns = gather_txns(
            &state.txns,
            self.store.as_ref(),
            txpow.body().txn_list(),
        )?;
        let ctx = TransactionContext {
            mmr: parent.mmr(),
            block_number: txpow.block_number(),
            magic: txpow.header().magic(),
            proof_history: state.params.proof_history,
            interpreter: self.interpreter.as_ref(),
        };
        check_block_transactions(&ctx, &txpow, &txns)?;

        let (txblock, state_notifications) = TxBlock::build(parent.mmr(), &txpow, &txns)?;
        let applied = txblock.apply(parent.mmr())?;
        let root = applied.mmr.get_root()?;
        let header = txpow.header();
        if root.hash() != header.mmr_root() || root.value() != header.mmr_total() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {id} MMR root or total does not match its transactions"
            )));
        }

        let mut notifications = Vec::new();
        let mut relevant_spent = Vec::new();
        let mut relevant_created = Vec::new();
        for coin in &applied.spent {
            let relevant = self.wallet.is_relevant(coin);
            if relevant {
                relevant_spent.push(*coin.coin_id());
            }
            notifications.push(CoinNotification {
                coin: coin.clone(),
                relevant,
            });
        }
        for coin in &applied.created {
            let relevant = self.wallet.is_relevant(coin);
            if relevant {
                relevant_created.push(coin.clone());
            }
            notifications.push(CoinNotification {
                coin: coin.clone(),
                relevant,
            });
        }

        let block_number = txpow.block_number();
        let node = TreeNode::new(id, txblock, applied.mmr, applied.created)
            .with_relevant(relevant_created, relevant_spent);
        let old_tip = *state.tree.tip()?.id();
        state.tree.add_node(node)?;
        debug!("Added block {block_number} {id} to the tree");

        // Saved only once the tree holds it, so every saved id replays
        if persist {
            if let Err(e) = self.persist_block(&txpow, &txns) {
                state.tree.remove_leaf(&id)?;
                return Err(e);
            }
        }

        let reorg = if state.tree.select_tip() {
            let reorg = describe_reorg(&state.tree, old_tip)?;
            if reorg.is_extension() {
                info!("New tip block {block_number} {}", reorg.new_tip);
            } else {
                info!(
                    "Reorg to {} : {} blocks disconnected, {} connected",
                    reorg.new_tip,
                    reorg.disconnected.len(),
                    reorg.connected.len()
                );
            }
            Some(reorg)
        } else {
            None
        };

        let cascaded = self.cascade_locked(state, persist)?;
        Ok(ApplyOutcome {
            id,
            block_number,
            notifications,
            state: state_notifications,
            reorg,
            cascaded,
        })
    }

    fn persist_block(&self, txpow: &TxPoW, txns: &[TxPoW]) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        for txn in txns {
            store.put_txpow(txn)?;
        }
        store.append_block(txpow)
    }

    fn cascade_locked(&self, state: &mut LedgerState, persist: bool) -> Result<bool> {
        let LedgerState {
            params,
            tree,
            cascade,
            root_coins,
            txns,
            ..
        } = state;

        let pruned = advance_root(tree, cascade, params, |tree, pruned, new_root| {
            for node in pruned.iter().skip(1) {
                apply_relevant(root_coins, node);
            }
            let root = tree.get(new_root).ok_or_else(|| {
                LedgerError::Consistency(format!("New root {new_root} missing"))
            })?;
            apply_relevant(root_coins, root);
            Ok(root_coins.iter().map(|coin| coin.mmr_entry()).collect())
        })?;
        let Some(pruned) = pruned else {
            return Ok(false);
        };

        for node in &pruned {
            for txn_id in node.txblock().txpow().body().txn_list() {
                txns.remove(txn_id);
            }
        }
        let evicted = evict_stale_units(tree, &pruned, txns, params.proof_history)?;

        if persist {
            if let Some(store) = &self.store {
                let root = tree.root()?;
                let snapshot = RootSnapshot {
                    txblock: root.txblock().clone(),
                    mmr: root.mmr().to_snapshot(),
                    coins: root_coins.clone(),
                };
                // pruned blocks and dead side branches go with their ids
                store.save_root(&snapshot, cascade, &tree.ids_in_seen_order())?;
                for node in &pruned {
                    for txn_id in node.txblock().txpow().body().txn_list() {
                        store.remove_txpow(txn_id)?;
                    }
                }
                for txn_id in &evicted {
                    store.remove_txpow(txn_id)?;
                }
            }
        }
        Ok(true)
    }

    fn block_info(state: &LedgerState, node: &TreeNode) -> Result<BlockInfo> {
        Ok(BlockInfo {
            id: *node.id(),
            header: node.header().clone(),
            total_weight: node.total_weight().clone(),
            status: state.tree.block_status(node.id())?,
        })
    }

    pub fn tip(&self) -> Result<BlockInfo> {
        let state = self.read()?;
        Self::block_info(&state, state.tree.tip()?)
    }

    pub fn root(&self) -> Result<BlockInfo> {
        let state = self.read()?;
        Self::block_info(&state, state.tree.root()?)
    }

    pub fn block(&self, id: &Hash) -> Result<Option<BlockInfo>> {
        let state = self.read()?;
        match state.tree.get(id) {
            Some(node) => Ok(Some(Self::block_info(&state, node)?)),
            None => Ok(None),
        }
    }

    pub fn txpow(&self, id: &Hash) -> Result<Option<TxPoW>> {
        let state = self.read()?;
        if let Some(node) = state.tree.get(id) {
            return Ok(Some(node.txblock().txpow().clone()));
        }
        Ok(state.txns.get(id).cloned())
    }

    pub fn block_status(&self, id: &Hash) -> Result<BlockStatus> {
        let state = self.read()?;
        if state.cascade.contains(id) {
            return Ok(BlockStatus::Finalized);
        }
        state.tree.block_status(id)
    }

    /// Main chain headers from the tip down to the root
    pub fn main_chain(&self) -> Result<Vec<BlockInfo>> {
        let state = self.read()?;
        let tip = *state.tree.tip()?.id();
        state
            .tree
            .path_to_root(&tip)?
            .into_iter()
            .map(|node| Self::block_info(&state, node))
            .collect()
    }

    pub fn cascade(&self) -> Result<Cascade> {
        Ok(self.read()?.cascade.clone())
    }

    pub fn status(&self) -> Result<ChainStatus> {
        let state = self.read()?;
        let tip = state.tree.tip()?;
        let root = state.tree.root()?;
        let chain_weight = state.cascade.total_weight() + tip.total_weight();
        Ok(ChainStatus {
            network: state.params.network.to_string(),
            chain_id: state.params.chain_id,
            tip_id: *tip.id(),
            tip_block: tip.block_number(),
            root_id: *root.id(),
            root_block: root.block_number(),
            tree_size: state.tree.len(),
            cascade_len: state.cascade.len(),
            cascade_tip: state.cascade.tip().map(|n| n.block_number()),
            chain_weight: chain_weight.to_string(),
            halted: state.halted,
        })
    }

    pub fn chain_summary(&self) -> Result<ChainSummary> {
        let state = self.read()?;
        let tip = state.tree.tip()?;
        let ids = state
            .tree
            .path_to_root(tip.id())?
            .iter()
            .map(|node| *node.id())
            .collect();
        Ok(ChainSummary {
            tip_block: tip.block_number(),
            ids,
        })
    }

    /// Relevant coins unspent at the tip
    pub fn relevant_coins(&self) -> Result<Vec<Coin>> {
        let state = self.read()?;
        let tip = *state.tree.tip()?.id();
        let mut coins = state.root_coins.clone();
        let path = state.tree.path_to_root(&tip)?;
        for node in path.iter().rev().skip(1) {
            apply_relevant(&mut coins, node);
        }
        Ok(coins)
    }

    /// An unspent coin on the main chain, if the ledger still knows it
    pub fn find_coin(&self, coin_id: &Hash) -> Result<Option<Coin>> {
        let state = self.read()?;
        find_unspent(&state, coin_id)
    }

    /// The coin with a proof to its peak in the tip MMR, for a peer
    pub fn coin_proof(&self, coin_id: &Hash) -> Result<CoinProof> {
        let state = self.read()?;
        let coin = find_unspent(&state, coin_id)?.ok_or_else(|| {
            LedgerError::ProofUnavailable(format!("Coin {coin_id} is not unspent on the main chain"))
        })?;
        let proof = state.tree.tip()?.mmr().get_proof_to_peak(coin.mmr_entry())?;
        Ok(CoinProof::new(coin, proof))
    }

    /// Check a coin proof received from a peer against the main chain
    pub fn check_coin_proof(&self, coin_proof: &CoinProof) -> Result<bool> {
        let state = self.read()?;
        let tip = state.tree.tip()?;
        let coin = coin_proof.coin();
        let data = coin_proof.mmr_data()?;
        if !tip
            .mmr()
            .check_proof_time_valid(coin.mmr_entry(), &data, coin_proof.proof())
        {
            return Ok(false);
        }
        Ok(match tip.mmr().get_entry(coin.mmr_entry()) {
            Some(current) => *current == data,
            None => true,
        })
    }

    /// An unsealed block on the tip carrying `body`. The caller grinds the
    /// nonce until the id meets the block difficulty.
    pub fn block_template(
        &self,
        body: TxBody,
        desired: Option<MagicValues>,
        time_milli: u64,
    ) -> Result<TxPoW> {
        let tip = *self.read()?.tree.tip()?.id();
        self.block_template_on(&tip, body, desired, time_milli)
    }

    /// Same as [`Ledger::block_template`] but on any block in the tree
    pub fn block_template_on(
        &self,
        parent_id: &Hash,
        body: TxBody,
        desired: Option<MagicValues>,
        time_milli: u64,
    ) -> Result<TxPoW> {
        let state = self.read()?;
        if state.halted {
            return Err(LedgerError::Halted(
                "No templates after a consistency failure".to_string(),
            ));
        }
        let node = state
            .tree
            .get(parent_id)
            .ok_or(LedgerError::UnknownParent(*parent_id))?;
        let parent = node.header();
        let levels = state.params.cascade_levels;

        let super_parents = parent
            .super_parents()
            .next(node.id(), parent.super_level(levels)?);
        let desired = desired.unwrap_or_else(|| parent.magic().desired().clone());
        let magic = parent.magic().next(desired, &state.bounds);
        let difficulty = magic.current().min_work;

        let header = TxHeader::new(
            state.params.chain_id,
            node.block_number() + 1,
            time_milli,
            difficulty,
            super_parents,
            magic,
        );
        let mut txpow = TxPoW::new(header, body)?;

        let txns = gather_txns(
            &state.txns,
            self.store.as_ref(),
            txpow.body().txn_list(),
        )?;
        let (txblock, _) = TxBlock::build(node.mmr(), &txpow, &txns)?;
        let root = txblock.apply(node.mmr())?.mmr.get_root()?;
        txpow
            .header_mut()
            .set_mmr(*root.hash(), root.value().clone());
        Ok(txpow)
    }
}

fn find_unspent(state: &LedgerState, coin_id: &Hash) -> Result<Option<Coin>> {
    let tip = state.tree.tip()?;
    let path = state.tree.path_to_root(tip.id())?;
    let candidate = path
        .iter()
        .flat_map(|node| node.created().iter())
        .chain(state.root_coins.iter())
        .find(|coin| coin.coin_id() == coin_id);
    let Some(coin) = candidate else {
        return Ok(None);
    };
    let unspent = tip.mmr().get_entry(coin.mmr_entry()) == Some(&coin.mmr_data()?);
    Ok(unspent.then(|| coin.clone()))
}

fn describe_reorg(tree: &TxPowTree, old_tip: Hash) -> Result<Reorg> {
    let new_tip = *tree.tip()?.id();
    let common_ancestor = tree.common_ancestor(&old_tip, &new_tip)?;

    let disconnected = tree
        .path_to_root(&old_tip)?
        .iter()
        .map(|node| *node.id())
        .take_while(|id| *id != common_ancestor)
        .collect();
    let mut connected: Vec<Hash> = tree
        .path_to_root(&new_tip)?
        .iter()
        .map(|node| *node.id())
        .take_while(|id| *id != common_ancestor)
        .collect();
    connected.reverse();

    Ok(Reorg {
        old_tip,
        new_tip,
        common_ancestor,
        disconnected,
        connected,
    })
}
