// The accumulator itself. Every tree node owns one `Mmr` snapshot: a small map
// of the nodes that changed in that block, layered over the parent's snapshot
// through an Arc. Reading walks down the layers until a node is found, so a new
// block only pays for what it touches and sibling branches share everything
// below their fork point.
//
// Positions are (row, index): row 0 holds the leaves in entry order, and the
// node at (row, i) is the parent of (row - 1, 2i) and (row - 1, 2i + 1).
// The peaks follow from the binary decomposition of the entry count.

use crate::core::mmr::{MmrData, MmrProof, ProofChunk};
use crate::error::{LedgerError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct MmrPosition {
    pub row: u32,
    pub index: u64,
}

impl MmrPosition {
    pub fn leaf(entry: u64) -> MmrPosition {
        MmrPosition {
            row: 0,
            index: entry,
        }
    }

    pub fn sibling(&self) -> MmrPosition {
        MmrPosition {
            row: self.row,
            index: self.index ^ 1,
        }
    }

    pub fn parent(&self) -> MmrPosition {
        MmrPosition {
            row: self.row + 1,
            index: self.index >> 1,
        }
    }

    pub fn is_right(&self) -> bool {
        self.index & 1 == 1
    }
}

/// A peak of the mountain range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct MmrPeak {
    pub position: MmrPosition,
    pub data: MmrData,
}

/// A parentless snapshot in storable form
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct MmrSnapshot {
    block_time: u64,
    entry_count: u64,
    nodes: Vec<(MmrPosition, MmrData)>,
}

fn peak_positions(entry_count: u64) -> Vec<MmrPosition> {
    let mut peaks = Vec::new();
    let mut start = 0u64;
    for row in (0..64u32).rev() {
        let size = 1u64 << row;
        if entry_count & size != 0 {
            peaks.push(MmrPosition {
                row,
                index: start >> row,
            });
            start += size;
        }
    }
    peaks
}

/// Index into the peak list and the peak whose mountain holds `entry`
fn covering_peak(entry_count: u64, entry: u64) -> Option<(usize, MmrPosition)> {
    if entry >= entry_count {
        return None;
    }
    peak_positions(entry_count)
        .into_iter()
        .enumerate()
        .find(|(_, peak)| entry >> peak.row == peak.index)
}

fn bag(peaks: &[MmrPeak]) -> Result<MmrData> {
    let mut iter = peaks.iter().rev();
    let Some(last) = iter.next() else {
        return Ok(MmrData::empty());
    };
    let mut root = last.data.clone();
    for peak in iter {
        root = MmrData::parent(&peak.data, &root)?;
    }
    Ok(root)
}

#[derive(Debug, Clone)]
pub struct Mmr {
    parent: Option<Arc<Mmr>>,
    block_time: u64,
    entry_count: u64,
    nodes: Arc<HashMap<MmrPosition, MmrData>>,
    finalized: bool,
}

impl Default for Mmr {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmr {
    /// An empty, writable accumulator at block time 0
    pub fn new() -> Mmr {
        Mmr {
            parent: None,
            block_time: 0,
            entry_count: 0,
            nodes: Arc::new(HashMap::new()),
            finalized: false,
        }
    }

    /// A writable layer over `parent` for the block at `block_time`
    pub fn child(parent: &Arc<Mmr>, block_time: u64) -> Mmr {
        Mmr {
            parent: Some(Arc::clone(parent)),
            block_time,
            entry_count: parent.entry_count,
            nodes: Arc::new(HashMap::new()),
            finalized: false,
        }
    }

    /// The same layer placed over a different parent. The node map is shared,
    /// not copied.
    pub fn rebase(&self, parent: Option<Arc<Mmr>>) -> Mmr {
        Mmr {
            parent,
            block_time: self.block_time,
            entry_count: self.entry_count,
            nodes: Arc::clone(&self.nodes),
            finalized: self.finalized,
        }
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    pub fn set_block_time(&mut self, block_time: u64) -> Result<()> {
        self.ensure_writable()?;
        self.block_time = block_time;
        Ok(())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn parent(&self) -> Option<&Arc<Mmr>> {
        self.parent.as_ref()
    }

    /// Nodes held by this layer alone
    pub fn delta_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn set_finalized(&mut self, finalized: bool) {
        self.finalized = finalized;
    }

    /// Close the current unit of work; the snapshot is read-only afterwards
    pub fn finalize_set(&mut self) {
        self.finalized = true;
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.finalized {
            return Err(LedgerError::Consistency(format!(
                "Attempt to modify finalized MMR at block time {}",
                self.block_time
            )));
        }
        Ok(())
    }

    fn set(&mut self, position: MmrPosition, data: MmrData) {
        Arc::make_mut(&mut self.nodes).insert(position, data);
    }

    pub fn get(&self, position: MmrPosition) -> Option<&MmrData> {
        let mut current = Some(self);
        while let Some(mmr) = current {
            if let Some(data) = mmr.nodes.get(&position) {
                return Some(data);
            }
            current = mmr.parent.as_deref();
        }
        None
    }

    pub fn get_entry(&self, entry: u64) -> Option<&MmrData> {
        if entry >= self.entry_count {
            return None;
        }
        self.get(MmrPosition::leaf(entry))
    }

    fn require(&self, position: MmrPosition) -> Result<&MmrData> {
        self.get(position).ok_or_else(|| {
            LedgerError::ProofUnavailable(format!(
                "No MMR data at row {} index {} (block time {})",
                position.row, position.index, self.block_time
            ))
        })
    }

    /// The snapshot in this layer chain recorded at `block_time`
    pub fn at_block_time(&self, block_time: u64) -> Option<&Mmr> {
        let mut current = Some(self);
        while let Some(mmr) = current {
            if mmr.block_time == block_time {
                return Some(mmr);
            }
            if mmr.block_time < block_time {
                return None;
            }
            current = mmr.parent.as_deref();
        }
        None
    }

    /// Append a leaf, merging equal-height mountains. Returns its entry number.
    pub fn add_entry(&mut self, data: MmrData) -> Result<u64> {
        self.ensure_writable()?;
        let entry = self.entry_count;
        let mut position = MmrPosition::leaf(entry);
        let mut current = data;
        self.set(position, current.clone());
        self.entry_count += 1;

        while position.is_right() {
            let left = self.get(position.sibling()).cloned().ok_or_else(|| {
                LedgerError::Consistency(format!(
                    "Missing left mountain at row {} while appending entry {entry}",
                    position.row
                ))
            })?;
            current = MmrData::parent(&left, &current)?;
            position = position.parent();
            self.set(position, current.clone());
        }
        Ok(entry)
    }

    /// Replace the leaf at `entry` and rehash its path up to the current peak.
    ///
    /// Siblings come from this snapshot where known, otherwise from `proof`,
    /// which may have been taken against an older snapshot. Siblings taken from
    /// the proof are stored so later proofs for this entry can be built.
    /// Returns the new peak.
    pub fn update_entry(&mut self, entry: u64, proof: &MmrProof, data: MmrData) -> Result<MmrData> {
        self.ensure_writable()?;
        let (_, peak) = covering_peak(self.entry_count, entry).ok_or_else(|| {
            LedgerError::InvalidTransaction(format!(
                "MMR entry {entry} does not exist (entry count {})",
                self.entry_count
            ))
        })?;

        let mut position = MmrPosition::leaf(entry);
        let mut current = data;
        self.set(position, current.clone());

        while position.row < peak.row {
            let sibling_position = position.sibling();
            let sibling = match self.get(sibling_position) {
                Some(data) => data.clone(),
                None => {
                    let chunk = proof.chunks().get(position.row as usize).ok_or_else(|| {
                        LedgerError::ProofUnavailable(format!(
                            "No sibling for entry {entry} at row {}",
                            position.row
                        ))
                    })?;
                    if chunk.is_left() != position.is_right() {
                        return Err(LedgerError::InvalidTransaction(format!(
                            "Proof side mismatch for entry {entry} at row {}",
                            position.row
                        )));
                    }
                    let data = chunk.data().clone();
                    self.set(sibling_position, data.clone());
                    data
                }
            };

            current = if position.is_right() {
                MmrData::parent(&sibling, &current)?
            } else {
                MmrData::parent(&current, &sibling)?
            };
            position = position.parent();
            self.set(position, current.clone());
        }
        Ok(current)
    }

    pub fn peak_positions(&self) -> Vec<MmrPosition> {
        peak_positions(self.entry_count)
    }

    /// Peaks from the tallest (oldest) mountain to the newest
    pub fn get_peaks(&self) -> Result<Vec<MmrPeak>> {
        peak_positions(self.entry_count)
            .into_iter()
            .map(|position| {
                let data = self.get(position).cloned().ok_or_else(|| {
                    LedgerError::Consistency(format!(
                        "Missing MMR peak at row {} index {}",
                        position.row, position.index
                    ))
                })?;
                Ok(MmrPeak { position, data })
            })
            .collect()
    }

    /// Peaks bagged right to left. The empty accumulator has the empty root.
    pub fn get_root(&self) -> Result<MmrData> {
        bag(&self.get_peaks()?)
    }

    /// Sibling path from the leaf to the top of its mountain
    pub fn get_proof_to_peak(&self, entry: u64) -> Result<MmrProof> {
        let (_, peak) = covering_peak(self.entry_count, entry).ok_or_else(|| {
            LedgerError::ProofUnavailable(format!(
                "MMR entry {entry} does not exist (entry count {})",
                self.entry_count
            ))
        })?;

        let mut proof = MmrProof::empty(self.block_time);
        let mut position = MmrPosition::leaf(entry);
        while position.row < peak.row {
            let sibling = self.require(position.sibling())?;
            proof.push(ProofChunk::new(position.is_right(), sibling.clone()));
            position = position.parent();
        }
        Ok(proof)
    }

    /// Sibling path to the peak followed by the peaks needed to reach the root
    pub fn get_proof(&self, entry: u64) -> Result<MmrProof> {
        let mut proof = self.get_proof_to_peak(entry)?;
        let peaks = self.get_peaks()?;
        let (peak_index, _) = covering_peak(self.entry_count, entry).ok_or_else(|| {
            LedgerError::ProofUnavailable(format!("MMR entry {entry} does not exist"))
        })?;

        if peak_index + 1 < peaks.len() {
            proof.push(ProofChunk::new(false, bag(&peaks[peak_index + 1..])?));
        }
        for peak in peaks[..peak_index].iter().rev() {
            proof.push(ProofChunk::new(true, peak.data.clone()));
        }
        Ok(proof)
    }

    /// Check a full proof against the current root
    pub fn check_proof(&self, data: &MmrData, proof: &MmrProof) -> Result<bool> {
        Ok(proof.calculate(data)? == self.get_root()?)
    }

    /// Check a proof against the snapshot it was taken from. The snapshot must
    /// still be reachable from this one, the proof's sides must match the entry
    /// number, and the fold must land on the entry's peak at that time (or on
    /// the root, for a full proof).
    pub fn check_proof_time_valid(&self, entry: u64, data: &MmrData, proof: &MmrProof) -> bool {
        let Some(snapshot) = self.at_block_time(proof.block_time()) else {
            debug!(
                "No MMR snapshot at block time {} for entry {entry}",
                proof.block_time()
            );
            return false;
        };
        match snapshot.check_proof_at(entry, data, proof) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Proof check for entry {entry} failed: {e}");
                false
            }
        }
    }

    fn check_proof_at(&self, entry: u64, data: &MmrData, proof: &MmrProof) -> Result<bool> {
        let Some((_, peak)) = covering_peak(self.entry_count, entry) else {
            return Ok(false);
        };
        let depth = peak.row as usize;
        if !proof.matches_entry(entry, depth) {
            return Ok(false);
        }
        if proof.len() == depth {
            let at_peak = proof.calculate_prefix(data, depth)?;
            return Ok(self.get(peak) == Some(&at_peak));
        }
        self.check_proof(data, proof)
    }

    /// A parentless copy holding the peaks plus the full paths of the entries
    /// in `keep`. Entries whose path is not known are dropped with a warning.
    pub fn collapse(&self, keep: &[u64]) -> Result<Mmr> {
        let mut nodes = HashMap::new();
        for peak in self.get_peaks()? {
            nodes.insert(peak.position, peak.data);
        }

        for &entry in keep {
            let Some((_, peak)) = covering_peak(self.entry_count, entry) else {
                continue;
            };
            let mut path = Vec::new();
            let mut position = MmrPosition::leaf(entry);
            let mut complete = true;
            while position.row < peak.row {
                match (self.get(position), self.get(position.sibling())) {
                    (Some(node), Some(sibling)) => {
                        path.push((position, node.clone()));
                        path.push((position.sibling(), sibling.clone()));
                    }
                    _ => {
                        complete = false;
                        break;
                    }
                }
                position = position.parent();
            }
            if complete {
                nodes.extend(path);
            } else {
                warn!("Dropping MMR entry {entry} from collapsed snapshot, path incomplete");
            }
        }

        Ok(Mmr {
            parent: None,
            block_time: self.block_time,
            entry_count: self.entry_count,
            nodes: Arc::new(nodes),
            finalized: true,
        })
    }

    /// A parentless copy holding every node visible from this snapshot
    pub fn flatten(&self) -> Mmr {
        let mut layers = Vec::new();
        let mut current = Some(self);
        while let Some(mmr) = current {
            layers.push(mmr);
            current = mmr.parent.as_deref();
        }

        let mut nodes = HashMap::new();
        for layer in layers.iter().rev() {
            for (position, data) in layer.nodes.iter() {
                nodes.insert(*position, data.clone());
            }
        }

        Mmr {
            parent: None,
            block_time: self.block_time,
            entry_count: self.entry_count,
            nodes: Arc::new(nodes),
            finalized: self.finalized,
        }
    }

    pub fn to_snapshot(&self) -> MmrSnapshot {
        let flat = self.flatten();
        let mut nodes: Vec<(MmrPosition, MmrData)> = flat
            .nodes
            .iter()
            .map(|(position, data)| (*position, data.clone()))
            .collect();
        nodes.sort_by_key(|(position, _)| *position);
        MmrSnapshot {
            block_time: self.block_time,
            entry_count: self.entry_count,
            nodes,
        }
    }

    pub fn from_snapshot(snapshot: MmrSnapshot) -> Mmr {
        Mmr {
            parent: None,
            block_time: snapshot.block_time,
            entry_count: snapshot.entry_count,
            nodes: Arc::new(snapshot.nodes.into_iter().collect()),
            finalized: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Amount;

    fn leaf(name: &str, value: i64) -> MmrData {
        MmrData::leaf(&name.to_string(), &Amount::from_int(value)).unwrap()
    }

    fn build(count: usize) -> Mmr {
        let mut mmr = Mmr::new();
        for i in 0..count {
            mmr.add_entry(leaf(&format!("leaf{i}"), 1)).unwrap();
        }
        mmr
    }

    #[test]
    fn test_empty_mmr() {
        let mmr = Mmr::new();
        assert!(mmr.get_peaks().unwrap().is_empty());
        assert_eq!(mmr.get_root().unwrap(), MmrData::empty());
    }

    #[test]
    fn test_peaks_follow_entry_count() {
        let mmr = build(11);
        let rows: Vec<u32> = mmr.get_peaks().unwrap().iter().map(|p| p.position.row).collect();
        // 11 = 8 + 2 + 1
        assert_eq!(rows, vec![3, 1, 0]);
        assert_eq!(mmr.get_root().unwrap().value(), &Amount::from_int(11));
    }

    #[test]
    fn test_append_order_only() {
        let mut single = Mmr::new();
        for name in ["A", "B", "C"] {
            single.add_entry(leaf(name, 1)).unwrap();
        }
        single.finalize_set();

        let mut first = Mmr::new();
        first.add_entry(leaf("A", 1)).unwrap();
        first.add_entry(leaf("B", 1)).unwrap();
        first.finalize_set();
        let first = Arc::new(first);
        let mut second = Mmr::child(&first, 1);
        second.add_entry(leaf("C", 1)).unwrap();
        second.finalize_set();

        assert_eq!(single.get_root().unwrap(), second.get_root().unwrap());
    }

    #[test]
    fn test_proof_round_trip_after_more_inserts() {
        let mut mmr = Mmr::new();
        let mut leaves = Vec::new();
        for i in 0..20 {
            let data = leaf(&format!("coin{i}"), i + 1);
            mmr.add_entry(data.clone()).unwrap();
            leaves.push(data);
            for (entry, data) in leaves.iter().enumerate() {
                let proof = mmr.get_proof(entry as u64).unwrap();
                assert!(mmr.check_proof(data, &proof).unwrap());
                let to_peak = mmr.get_proof_to_peak(entry as u64).unwrap();
                assert!(mmr.check_proof_time_valid(entry as u64, data, &to_peak));
            }
        }
    }

    #[test]
    fn test_wrong_data_or_position_fails() {
        let mmr = build(8);
        let proof = mmr.get_proof_to_peak(3).unwrap();
        let real = leaf("leaf3", 1);
        assert!(mmr.check_proof_time_valid(3, &real, &proof));
        assert!(!mmr.check_proof_time_valid(3, &leaf("leaf3", 2), &proof));
        assert!(!mmr.check_proof_time_valid(2, &real, &proof));
    }

    #[test]
    fn test_finalized_mmr_rejects_mutation() {
        let mut mmr = build(2);
        mmr.finalize_set();
        assert!(mmr.add_entry(leaf("x", 1)).is_err());
        let proof = mmr.get_proof_to_peak(0).unwrap();
        assert!(mmr.update_entry(0, &proof, leaf("x", 0)).is_err());

        mmr.set_finalized(false);
        assert!(mmr.add_entry(leaf("x", 1)).is_ok());
    }

    #[test]
    fn test_update_entry_keeps_other_proofs_valid() {
        let mut mmr = build(7);
        let proof = mmr.get_proof_to_peak(2).unwrap();
        mmr.update_entry(2, &proof, leaf("leaf2", 0)).unwrap();

        assert_eq!(mmr.get_root().unwrap().value(), &Amount::from_int(6));
        for entry in [0u64, 1, 3, 4, 5, 6] {
            let data = leaf(&format!("leaf{entry}"), 1);
            let proof = mmr.get_proof(entry).unwrap();
            assert!(mmr.check_proof(&data, &proof).unwrap());
        }
    }

    #[test]
    fn test_historical_proof_rolls_forward() {
        let mut base = build(3);
        base.set_block_time(1).unwrap();
        base.finalize_set();
        let base = Arc::new(base);
        let old_proof = base.get_proof_to_peak(1).unwrap();

        let mut next = Mmr::child(&base, 2);
        for i in 3..8 {
            next.add_entry(leaf(&format!("leaf{i}"), 1)).unwrap();
        }

        let data = leaf("leaf1", 1);
        assert!(next.check_proof_time_valid(1, &data, &old_proof));

        next.update_entry(1, &old_proof, data.clone()).unwrap();
        let fresh = next.get_proof_to_peak(1).unwrap();
        assert_eq!(fresh.block_time(), 2);
        assert_eq!(fresh.len(), 3);
        next.finalize_set();
        assert!(next.check_proof_time_valid(1, &data, &fresh));
    }

    #[test]
    fn test_unknown_block_time_is_invalid() {
        let mmr = build(4);
        let mut proof = mmr.get_proof_to_peak(0).unwrap();
        proof = MmrProof::new(99, proof.chunks().to_vec());
        assert!(!mmr.check_proof_time_valid(0, &leaf("leaf0", 1), &proof));
    }

    #[test]
    fn test_collapse_keeps_root_and_kept_paths() {
        let mut base = build(13);
        base.finalize_set();
        let collapsed = base.collapse(&[5]).unwrap();

        assert!(collapsed.parent().is_none());
        assert_eq!(collapsed.get_root().unwrap(), base.get_root().unwrap());
        assert!(collapsed.get_proof(5).is_ok());
        assert!(matches!(
            collapsed.get_proof_to_peak(2),
            Err(LedgerError::ProofUnavailable(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut base = build(9);
        base.finalize_set();
        let restored = Mmr::from_snapshot(base.to_snapshot());
        assert_eq!(restored.get_root().unwrap(), base.get_root().unwrap());
        assert_eq!(restored.entry_count(), 9);
    }

    #[test]
    fn test_rebase_shares_layer() {
        let mut base = build(2);
        base.finalize_set();
        let base = Arc::new(base);
        let mut layer = Mmr::child(&base, 1);
        layer.add_entry(leaf("c", 1)).unwrap();
        layer.finalize_set();

        let flat = Arc::new(base.flatten());
        let rebased = layer.rebase(Some(flat));
        assert_eq!(rebased.get_root().unwrap(), layer.get_root().unwrap());
    }
}
