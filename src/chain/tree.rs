//! The tree of unfinalized blocks
//!
//! Nodes are kept in an arena keyed by block id with parent and child links.
//! The root is the oldest block still in the tree; everything older lives in
//! the cascade. Each node owns the MMR its block produced, layered over its
//! parent's.

use crate::core::mmr::Mmr;
use crate::core::{Coin, Hash, TxBlock, TxHeader};
use crate::error::{LedgerError, Result};
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    /// Not in the tree or the cascade
    Unknown,
    /// In the tree on a branch that is not the main chain
    Orphaned,
    /// On the main chain between the root and the tip
    Applied,
    /// The root or older
    Finalized,
}

pub struct TreeNode {
    id: Hash,
    txblock: TxBlock,
    mmr: Arc<Mmr>,
    parent: Option<Hash>,
    children: Vec<Hash>,
    weight: BigUint,
    total_weight: BigUint,
    /// Every coin the block created, with MMR entries set
    created: Vec<Coin>,
    /// Created coins the wallet cares about
    relevant_created: Vec<Coin>,
    /// Ids of spent coins the wallet cared about
    relevant_spent: Vec<Hash>,
    seen: u64,
}

impl TreeNode {
    pub fn new(id: Hash, txblock: TxBlock, mmr: Mmr, created: Vec<Coin>) -> TreeNode {
        let weight = txblock.txpow().header().weight();
        TreeNode {
            id,
            txblock,
            mmr: Arc::new(mmr),
            parent: None,
            children: Vec::new(),
            total_weight: weight.clone(),
            weight,
            created,
            relevant_created: Vec::new(),
            relevant_spent: Vec::new(),
            seen: 0,
        }
    }

    pub fn with_relevant(mut self, created: Vec<Coin>, spent: Vec<Hash>) -> TreeNode {
        self.relevant_created = created;
        self.relevant_spent = spent;
        self
    }

    pub fn id(&self) -> &Hash {
        &self.id
    }

    pub fn txblock(&self) -> &TxBlock {
        &self.txblock
    }

    pub fn header(&self) -> &TxHeader {
        self.txblock.txpow().header()
    }

    pub fn block_number(&self) -> u64 {
        self.header().block_number()
    }

    pub fn mmr(&self) -> &Arc<Mmr> {
        &self.mmr
    }

    pub fn parent(&self) -> Option<&Hash> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[Hash] {
        &self.children
    }

    pub fn weight(&self) -> &BigUint {
        &self.weight
    }

    pub fn total_weight(&self) -> &BigUint {
        &self.total_weight
    }

    pub fn created(&self) -> &[Coin] {
        &self.created
    }

    pub fn relevant_created(&self) -> &[Coin] {
        &self.relevant_created
    }

    pub fn relevant_spent(&self) -> &[Hash] {
        &self.relevant_spent
    }

    /// Order in which the tree first saw this block
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

pub struct TxPowTree {
    nodes: HashMap<Hash, TreeNode>,
    root: Hash,
    tip: Hash,
    next_seen: u64,
}

impl TxPowTree {
    pub fn new(root: TreeNode) -> TxPowTree {
        let id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(id, root);
        TxPowTree {
            nodes,
            root: id,
            tip: id,
            next_seen: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &Hash) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    fn require(&self, id: &Hash) -> Result<&TreeNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| LedgerError::Consistency(format!("Block {id} missing from the tree")))
    }

    pub fn root(&self) -> Result<&TreeNode> {
        self.require(&self.root)
    }

    pub fn tip(&self) -> Result<&TreeNode> {
        self.require(&self.tip)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    /// Link `node` under its parent. The parent must already be in the tree.
    pub fn add_node(&mut self, mut node: TreeNode) -> Result<&TreeNode> {
        if self.nodes.contains_key(&node.id) {
            return Err(LedgerError::AlreadyKnown(node.id));
        }
        let parent_id = node.header().parent_id();
        let parent = self
            .nodes
            .get_mut(&parent_id)
            .ok_or(LedgerError::UnknownParent(parent_id))?;

        parent.children.push(node.id);
        node.parent = Some(parent_id);
        node.total_weight = &parent.total_weight + &node.weight;
        node.seen = self.next_seen;
        self.next_seen += 1;

        let id = node.id;
        self.nodes.insert(id, node);
        self.require(&id)
    }

    /// Take back a node added by [`TxPowTree::add_node`] before anything was
    /// built on it. The root and the tip cannot be removed.
    pub fn remove_leaf(&mut self, id: &Hash) -> Result<TreeNode> {
        if *id == self.root || *id == self.tip {
            return Err(LedgerError::Consistency(format!(
                "Cannot remove {id}, it is the root or the tip"
            )));
        }
        let node = self.require(id)?;
        if !node.children.is_empty() {
            return Err(LedgerError::Consistency(format!("Cannot remove {id}, it has children")));
        }
        let parent_id = node.parent;
        if let Some(parent) = parent_id.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| child != id);
        }
        self.nodes
            .remove(id)
            .ok_or_else(|| LedgerError::Consistency(format!("Node {id} vanished")))
    }

    /// Nodes without children
    pub fn leaves(&self) -> Vec<&TreeNode> {
        self.nodes.values().filter(|n| n.children.is_empty()).collect()
    }

    /// Heaviest leaf, the earliest seen among equals. Returns true if the tip
    /// moved.
    pub fn select_tip(&mut self) -> bool {
        let best = self
            .leaves()
            .into_iter()
            .max_by(|a, b| {
                a.total_weight
                    .cmp(&b.total_weight)
                    .then_with(|| b.seen.cmp(&a.seen))
            })
            .map(|n| n.id);

        match best {
            Some(best) if best != self.tip => {
                self.tip = best;
                true
            }
            _ => false,
        }
    }

    /// `id` and its ancestors down to the root, newest first
    pub fn path_to_root(&self, id: &Hash) -> Result<Vec<&TreeNode>> {
        let mut path = Vec::new();
        let mut current = Some(*id);
        while let Some(node_id) = current {
            let node = self.require(&node_id)?;
            path.push(node);
            current = node.parent;
        }
        Ok(path)
    }

    /// `n` generations above `id`, stopping at the root
    pub fn get_parent(&self, id: &Hash, n: usize) -> Result<&TreeNode> {
        let mut node = self.require(id)?;
        for _ in 0..n {
            match node.parent {
                Some(parent) => node = self.require(&parent)?,
                None => break,
            }
        }
        Ok(node)
    }

    /// The ancestor of `from` (or `from` itself) with the given block number
    pub fn get_past_node(&self, from: &Hash, block_number: u64) -> Option<&TreeNode> {
        let mut current = self.nodes.get(from);
        while let Some(node) = current {
            if node.block_number() == block_number {
                return Some(node);
            }
            if node.block_number() < block_number {
                return None;
            }
            current = node.parent.as_ref().and_then(|p| self.nodes.get(p));
        }
        None
    }

    pub fn common_ancestor(&self, a: &Hash, b: &Hash) -> Result<Hash> {
        let ancestors: HashSet<Hash> = self.path_to_root(a)?.iter().map(|n| n.id).collect();
        for node in self.path_to_root(b)? {
            if ancestors.contains(&node.id) {
                return Ok(node.id);
            }
        }
        Err(LedgerError::Consistency(format!(
            "Blocks {a} and {b} share no ancestor"
        )))
    }

    pub fn is_on_main_chain(&self, id: &Hash) -> Result<bool> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(false);
        };
        let tip = self.tip()?;
        if node.block_number() > tip.block_number() {
            return Ok(false);
        }
        Ok(self.get_past_node(&self.tip, node.block_number()).map(|n| n.id) == Some(*id))
    }

    pub fn block_status(&self, id: &Hash) -> Result<BlockStatus> {
        if *id == self.root {
            return Ok(BlockStatus::Finalized);
        }
        if !self.nodes.contains_key(id) {
            return Ok(BlockStatus::Unknown);
        }
        if self.is_on_main_chain(id)? {
            Ok(BlockStatus::Applied)
        } else {
            Ok(BlockStatus::Orphaned)
        }
    }

    /// All nodes in an order where parents come before children
    pub fn descendants(&self, id: &Hash) -> Vec<Hash> {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([*id]);
        while let Some(next) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&next) {
                queue.extend(node.children.iter().copied());
            }
            order.push(next);
        }
        order
    }

    /// Make `new_root` the root. Returns the main-chain nodes it replaces,
    /// oldest first; branches that do not lead to `new_root` are dropped.
    pub fn prune_to(&mut self, new_root: &Hash) -> Result<Vec<TreeNode>> {
        let path: Vec<Hash> = self.path_to_root(new_root)?.iter().map(|n| n.id).collect();
        let keep: HashSet<Hash> = self.descendants(new_root).into_iter().collect();

        let mut pruned = Vec::new();
        for id in path.iter().skip(1).rev() {
            if let Some(node) = self.nodes.remove(id) {
                pruned.push(node);
            }
        }
        self.nodes.retain(|id, _| keep.contains(id));

        let root = self
            .nodes
            .get_mut(new_root)
            .ok_or_else(|| LedgerError::Consistency(format!("New root {new_root} vanished")))?;
        root.parent = None;
        let offset = &root.total_weight - &root.weight;
        for node in self.nodes.values_mut() {
            node.total_weight = &node.total_weight - &offset;
        }

        self.root = *new_root;
        if !self.nodes.contains_key(&self.tip) {
            self.select_tip();
        }
        Ok(pruned)
    }

    /// Swap the root's MMR and re-layer every descendant over the new one
    pub fn replace_root_mmr(&mut self, mmr: Mmr) -> Result<()> {
        let root = self.root;
        self.nodes
            .get_mut(&root)
            .ok_or_else(|| LedgerError::Consistency("Tree has no root".to_string()))?
            .mmr = Arc::new(mmr);

        for id in self.descendants(&root).into_iter().skip(1) {
            let parent_id = self.require(&id)?.parent.ok_or_else(|| {
                LedgerError::Consistency(format!("Block {id} lost its parent"))
            })?;
            let parent_mmr = Arc::clone(&self.require(&parent_id)?.mmr);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.mmr = Arc::new(node.mmr.rebase(Some(parent_mmr)));
            }
        }
        Ok(())
    }

    /// Ids in the order they were added, root excluded
    pub fn ids_in_seen_order(&self) -> Vec<Hash> {
        let mut nodes: Vec<&TreeNode> = self
            .nodes
            .values()
            .filter(|n| n.id != self.root)
            .collect();
        nodes.sort_by_key(|n| n.seen);
        nodes.into_iter().map(|n| n.id).collect()
    }
}
