//! Block headers and super-parent pointers

use crate::core::{Amount, Hash, Magic, ProofOfWork};
use crate::error::Result;
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Hard limit on the number of cascade levels any chain may configure
pub const MAX_CASCADE_LEVELS: usize = 256;

/// For each cascade level, the id of the most recent ancestor whose super
/// level reaches it. Most entries repeat, so the encoding is a list of
/// (run length, hash) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperParents(Vec<Hash>);

impl SuperParents {
    /// All levels point at nothing
    pub fn genesis(levels: usize) -> SuperParents {
        SuperParents(vec![Hash::ZERO; levels])
    }

    pub fn from_vec(parents: Vec<Hash>) -> SuperParents {
        SuperParents(parents)
    }

    /// Pointers for a child of `parent_id`. Levels the parent reaches point
    /// at the parent; the rest are inherited.
    pub fn next(&self, parent_id: &Hash, parent_level: usize) -> SuperParents {
        SuperParents(
            self.0
                .iter()
                .enumerate()
                .map(|(level, inherited)| {
                    if level <= parent_level {
                        *parent_id
                    } else {
                        *inherited
                    }
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, level: usize) -> Option<&Hash> {
        self.0.get(level)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hash> {
        self.0.iter()
    }

    /// Run-length pairs, each run as long as possible
    pub fn runs(&self) -> Vec<(u32, Hash)> {
        let mut runs: Vec<(u32, Hash)> = Vec::new();
        for hash in &self.0 {
            match runs.last_mut() {
                Some((count, last)) if last == hash => *count += 1,
                _ => runs.push((1, *hash)),
            }
        }
        runs
    }

    fn from_runs(runs: Vec<(u32, Hash)>) -> std::result::Result<SuperParents, String> {
        let mut parents = Vec::new();
        let mut previous: Option<Hash> = None;
        for (count, hash) in runs {
            if count == 0 {
                return Err("zero-length super parent run".to_string());
            }
            if previous == Some(hash) {
                return Err("adjacent super parent runs repeat a hash".to_string());
            }
            if parents.len() + count as usize > MAX_CASCADE_LEVELS {
                return Err(format!("more than {MAX_CASCADE_LEVELS} super parents"));
            }
            parents.extend(std::iter::repeat(hash).take(count as usize));
            previous = Some(hash);
        }
        Ok(SuperParents(parents))
    }
}

impl Encode for SuperParents {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        self.runs().encode(encoder)
    }
}

impl<Context> Decode<Context> for SuperParents {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> std::result::Result<Self, DecodeError> {
        let runs = Vec::<(u32, Hash)>::decode(decoder)?;
        SuperParents::from_runs(runs).map_err(DecodeError::OtherString)
    }
}

bincode::impl_borrow_decode!(SuperParents);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxHeader {
    nonce: u64,
    chain_id: u8,
    time_milli: u64,
    block_number: u64,
    block_difficulty: Hash,
    super_parents: SuperParents,
    mmr_root: Hash,
    mmr_total: Amount,
    magic: Magic,
    custom_hash: Hash,
    body_hash: Hash,
}

impl TxHeader {
    pub fn new(
        chain_id: u8,
        block_number: u64,
        time_milli: u64,
        block_difficulty: Hash,
        super_parents: SuperParents,
        magic: Magic,
    ) -> TxHeader {
        TxHeader {
            nonce: 0,
            chain_id,
            time_milli,
            block_number,
            block_difficulty,
            super_parents,
            mmr_root: Hash::ZERO,
            mmr_total: Amount::zero(),
            magic,
            custom_hash: Hash::ZERO,
            body_hash: Hash::ZERO,
        }
    }

    /// Id of the unit this header seals
    pub fn id(&self) -> Result<Hash> {
        Hash::of(self)
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn chain_id(&self) -> u8 {
        self.chain_id
    }

    pub fn time_milli(&self) -> u64 {
        self.time_milli
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn block_difficulty(&self) -> &Hash {
        &self.block_difficulty
    }

    pub fn super_parents(&self) -> &SuperParents {
        &self.super_parents
    }

    pub fn mmr_root(&self) -> &Hash {
        &self.mmr_root
    }

    pub fn mmr_total(&self) -> &Amount {
        &self.mmr_total
    }

    pub fn set_mmr(&mut self, root: Hash, total: Amount) {
        self.mmr_root = root;
        self.mmr_total = total;
    }

    pub fn magic(&self) -> &Magic {
        &self.magic
    }

    pub fn custom_hash(&self) -> &Hash {
        &self.custom_hash
    }

    pub fn set_custom_hash(&mut self, custom_hash: Hash) {
        self.custom_hash = custom_hash;
    }

    pub fn body_hash(&self) -> &Hash {
        &self.body_hash
    }

    pub fn set_body_hash(&mut self, body_hash: Hash) {
        self.body_hash = body_hash;
    }

    /// Parent id, which is the level-0 super parent
    pub fn parent_id(&self) -> Hash {
        self.super_parents.get(0).copied().unwrap_or(Hash::ZERO)
    }

    /// Work this header's block adds to its chain
    pub fn weight(&self) -> BigUint {
        ProofOfWork::new(&self.block_difficulty).weight()
    }

    pub fn super_level(&self, levels: usize) -> Result<usize> {
        Ok(ProofOfWork::new(&self.block_difficulty).super_level(&self.id()?, levels))
    }
}
