use crate::core::mmr::MmrData;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One step of a proof: the sibling to combine with, and which side it is on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ProofChunk {
    is_left: bool,
    data: MmrData,
}

impl ProofChunk {
    pub fn new(is_left: bool, data: MmrData) -> ProofChunk {
        ProofChunk { is_left, data }
    }

    /// True when the sibling sits to the left of the running node
    pub fn is_left(&self) -> bool {
        self.is_left
    }

    pub fn data(&self) -> &MmrData {
        &self.data
    }
}

/// Path from a leaf up to a peak (and optionally on to the root) of the
/// accumulator as it stood at `block_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct MmrProof {
    block_time: u64,
    chunks: Vec<ProofChunk>,
}

impl MmrProof {
    pub fn new(block_time: u64, chunks: Vec<ProofChunk>) -> MmrProof {
        MmrProof { block_time, chunks }
    }

    /// Proof for the only leaf of a one-leaf tree
    pub fn empty(block_time: u64) -> MmrProof {
        MmrProof {
            block_time,
            chunks: Vec::new(),
        }
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    pub fn chunks(&self) -> &[ProofChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push(&mut self, chunk: ProofChunk) {
        self.chunks.push(chunk);
    }

    /// Fold the leaf up through every chunk
    pub fn calculate(&self, leaf: &MmrData) -> Result<MmrData> {
        self.calculate_prefix(leaf, self.chunks.len())
    }

    /// Fold only the first `depth` chunks
    pub fn calculate_prefix(&self, leaf: &MmrData, depth: usize) -> Result<MmrData> {
        let mut current = leaf.clone();
        for chunk in self.chunks.iter().take(depth) {
            current = if chunk.is_left {
                MmrData::parent(&chunk.data, &current)?
            } else {
                MmrData::parent(&current, &chunk.data)?
            };
        }
        Ok(current)
    }

    /// The first `depth` sides must spell out the leaf's entry number, bit by
    /// bit from the bottom, so a proof can't be replayed at another position.
    pub fn matches_entry(&self, entry: u64, depth: usize) -> bool {
        if self.chunks.len() < depth {
            return false;
        }
        self.chunks
            .iter()
            .take(depth)
            .enumerate()
            .all(|(row, chunk)| chunk.is_left == ((entry >> row) & 1 == 1))
    }
}
