//! Cascading finality
//!
//! Blocks that fall off the bottom of the tree are reduced to their headers
//! and pushed onto the cascade. The cascade is then thinned: each level keeps
//! a fixed number of headers, and once a level is full only headers whose
//! super level reaches the next level survive, counted at twice the weight.
//! The chain's weight is preserved in expectation while its size stays
//! logarithmic.

use crate::chain::tree::{TreeNode, TxPowTree};
use crate::config::ChainParams;
use crate::core::mmr::Mmr;
use crate::core::{Hash, TxHeader};
use crate::error::{LedgerError, Result};
use log::{debug, info};
use num_bigint::BigUint;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, bincode::Encode, bincode::Decode)]
pub struct CascadeNode {
    header: TxHeader,
    id: Hash,
    super_level: u32,
    level: u32,
}

impl CascadeNode {
    pub fn new(header: TxHeader, id: Hash, levels: usize) -> Result<CascadeNode> {
        let super_level = header.super_level(levels)? as u32;
        Ok(CascadeNode {
            header,
            id,
            super_level,
            level: 0,
        })
    }

    pub fn header(&self) -> &TxHeader {
        &self.header
    }

    pub fn id(&self) -> &Hash {
        &self.id
    }

    pub fn block_number(&self) -> u64 {
        self.header.block_number()
    }

    pub fn super_level(&self) -> u32 {
        self.super_level
    }

    /// Level this header is currently counted at
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn weight(&self) -> BigUint {
        self.header.weight() << self.level as usize
    }
}

/// Finalized headers, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Cascade {
    nodes: Vec<CascadeNode>,
}

impl Cascade {
    pub fn new() -> Cascade {
        Cascade::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tip(&self) -> Option<&CascadeNode> {
        self.nodes.first()
    }

    pub fn nodes(&self) -> &[CascadeNode] {
        &self.nodes
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.nodes.iter().any(|n| n.id == *id)
    }

    pub fn total_weight(&self) -> BigUint {
        self.nodes.iter().map(|n| n.weight()).sum()
    }

    /// Push a header that directly follows the current tip
    pub fn add_to_tip(&mut self, node: CascadeNode) -> Result<()> {
        if let Some(tip) = self.tip() {
            if node.block_number() != tip.block_number() + 1 {
                return Err(LedgerError::Consistency(format!(
                    "Cascade tip is block {} but block {} was added",
                    tip.block_number(),
                    node.block_number()
                )));
            }
        }
        self.nodes.insert(0, node);
        Ok(())
    }

    /// Keep `level_nodes` headers per level, promoting the survivors of a
    /// full level to the next one. The tip is always kept at level 0.
    pub fn thin(&mut self, levels: usize, level_nodes: usize) {
        let top = levels.saturating_sub(1) as u32;
        let mut level = 0u32;
        let mut at_level = 0usize;
        let before = self.nodes.len();

        let mut kept = Vec::with_capacity(self.nodes.len());
        for mut node in self.nodes.drain(..) {
            while at_level >= level_nodes && level < top {
                level += 1;
                at_level = 0;
            }
            if node.super_level < level {
                continue;
            }
            node.level = level;
            at_level += 1;
            kept.push(node);
        }
        self.nodes = kept;
        debug!("Cascade thinned from {before} to {} headers", self.nodes.len());
    }
}

/// Move the tree root up when the tree has grown `frequency` blocks past the
/// start depth. Pruned main-chain nodes go onto the cascade and the new
/// root's MMR is collapsed, keeping the paths of `keep`. Returns the nodes
/// that left the tree, oldest first.
pub fn advance_root<F>(
    tree: &mut TxPowTree,
    cascade: &mut Cascade,
    params: &ChainParams,
    keep: F,
) -> Result<Option<Vec<TreeNode>>>
where
    F: FnOnce(&TxPowTree, &[TreeNode], &Hash) -> Result<Vec<u64>>,
{
    let tip = tree.tip()?;
    let root = tree.root()?;
    let depth = tip.block_number() - root.block_number();
    if depth < params.cascade_start_depth + params.cascade_frequency {
        return Ok(None);
    }

    let target = tip.block_number() - params.cascade_start_depth + 1;
    let new_root = *tree
        .get_past_node(tip.id(), target)
        .ok_or_else(|| {
            LedgerError::Consistency(format!("Tip has no ancestor at block {target}"))
        })?
        .id();

    let pruned = tree.prune_to(&new_root)?;
    for node in &pruned {
        cascade.add_to_tip(CascadeNode::new(node.header().clone(), *node.id(), params.cascade_levels)?)?;
    }
    cascade.thin(params.cascade_levels, params.cascade_level_nodes);

    let entries = keep(tree, &pruned, &new_root)?;
    let collapsed: Mmr = tree.root()?.mmr().collapse(&entries)?;
    tree.replace_root_mmr(collapsed)?;

    check_cascade_invariant(tree, cascade)?;
    info!(
        "Cascade moved root to block {} ({} headers finalized, cascade holds {})",
        target,
        pruned.len(),
        cascade.len()
    );
    Ok(Some(pruned))
}

/// The cascade must end exactly one block below the tree root
pub fn check_cascade_invariant(tree: &TxPowTree, cascade: &Cascade) -> Result<()> {
    let root = tree.root()?;
    match cascade.tip() {
        None => Ok(()),
        Some(tip) if tip.block_number() + 1 == root.block_number() => Ok(()),
        Some(tip) => Err(LedgerError::Consistency(format!(
            "Cascade tip is block {} but the tree root is block {}",
            tip.block_number(),
            root.block_number()
        ))),
    }
}
