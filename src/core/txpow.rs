//! TxPoW units
//!
//! Every unit carries a header and a body. The same structure serves as a
//! transaction (its id meets the body's transaction difficulty) and as a block
//! (its id meets the header's block difficulty); a block also bundles other
//! transaction units by id.

use crate::core::{Hash, ProofOfWork, Transaction, TxHeader, Witness};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxBody {
    txn_difficulty: Hash,
    transaction: Transaction,
    witness: Witness,
    burn_transaction: Transaction,
    burn_witness: Witness,
    txn_list: Vec<Hash>,
}

impl TxBody {
    pub fn new(transaction: Transaction, witness: Witness) -> TxBody {
        TxBody {
            txn_difficulty: Hash::MAX,
            transaction,
            witness,
            burn_transaction: Transaction::new(),
            burn_witness: Witness::new(),
            txn_list: Vec::new(),
        }
    }

    /// A body with no transaction of its own
    pub fn empty() -> TxBody {
        TxBody::new(Transaction::new(), Witness::new())
    }

    pub fn with_burn(mut self, transaction: Transaction, witness: Witness) -> TxBody {
        self.burn_transaction = transaction;
        self.burn_witness = witness;
        self
    }

    pub fn with_txn_difficulty(mut self, difficulty: Hash) -> TxBody {
        self.txn_difficulty = difficulty;
        self
    }

    pub fn txn_difficulty(&self) -> &Hash {
        &self.txn_difficulty
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn witness(&self) -> &Witness {
        &self.witness
    }

    pub fn burn_transaction(&self) -> &Transaction {
        &self.burn_transaction
    }

    pub fn burn_witness(&self) -> &Witness {
        &self.burn_witness
    }

    pub fn txn_list(&self) -> &[Hash] {
        &self.txn_list
    }

    pub fn add_txn(&mut self, txpow_id: Hash) {
        self.txn_list.push(txpow_id);
    }

    pub fn hash(&self) -> Result<Hash> {
        Hash::of(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxPoW {
    header: TxHeader,
    body: TxBody,
}

impl TxPoW {
    /// Seal `body` under `header`, committing the body hash
    pub fn new(mut header: TxHeader, body: TxBody) -> Result<TxPoW> {
        header.set_body_hash(body.hash()?);
        Ok(TxPoW { header, body })
    }

    pub fn id(&self) -> Result<Hash> {
        self.header.id()
    }

    pub fn header(&self) -> &TxHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut TxHeader {
        &mut self.header
    }

    pub fn body(&self) -> &TxBody {
        &self.body
    }

    pub fn block_number(&self) -> u64 {
        self.header.block_number()
    }

    pub fn parent_id(&self) -> Hash {
        self.header.parent_id()
    }

    pub fn has_body_hash(&self) -> Result<bool> {
        Ok(*self.header.body_hash() == self.body.hash()?)
    }

    pub fn is_block(&self) -> Result<bool> {
        Ok(ProofOfWork::new(self.header.block_difficulty()).is_met_by(&self.id()?))
    }

    pub fn is_transaction(&self) -> Result<bool> {
        if self.body.transaction.is_empty() {
            return Ok(false);
        }
        Ok(ProofOfWork::new(&self.body.txn_difficulty).is_met_by(&self.id()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Magic, MagicBounds, SuperParents};

    fn txpow() -> TxPoW {
        let header = TxHeader::new(
            2,
            1,
            0,
            Hash::MAX,
            SuperParents::genesis(4),
            Magic::genesis(&MagicBounds::default()),
        );
        TxPoW::new(header, TxBody::empty()).unwrap()
    }

    #[test]
    fn test_body_hash_committed() {
        let unit = txpow();
        assert!(unit.has_body_hash().unwrap());
        assert_eq!(*unit.header().body_hash(), unit.body().hash().unwrap());
    }

    #[test]
    fn test_max_difficulty_is_always_a_block() {
        let unit = txpow();
        assert!(unit.is_block().unwrap());
        assert!(!unit.is_transaction().unwrap());
    }
}
