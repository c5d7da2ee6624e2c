use crate::core::{Amount, Hash};
use crate::error::Result;
use crate::utils::serialize;
use serde::{Deserialize, Serialize};

/// One node of the mountain range: a hash committing to everything below it
/// and the summed value of the leaves underneath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct MmrData {
    hash: Hash,
    value: Amount,
}

impl MmrData {
    pub fn new(hash: Hash, value: Amount) -> MmrData {
        MmrData { hash, value }
    }

    /// Root of an empty accumulator
    pub fn empty() -> MmrData {
        MmrData {
            hash: Hash::ZERO,
            value: Amount::zero(),
        }
    }

    /// Leaf node for any encodable object (a coin, a script)
    pub fn leaf<T: bincode::Encode>(object: &T, value: &Amount) -> Result<MmrData> {
        let object_bytes = serialize(object)?;
        let value_bytes = serialize(value)?;
        Ok(MmrData {
            hash: Hash::digest_parts(&[&object_bytes, &value_bytes]),
            value: value.clone(),
        })
    }

    pub fn parent(left: &MmrData, right: &MmrData) -> Result<MmrData> {
        let sum = &left.value + &right.value;
        let sum_bytes = serialize(&sum)?;
        Ok(MmrData {
            hash: Hash::digest_parts(&[left.hash.as_bytes(), right.hash.as_bytes(), &sum_bytes]),
            value: sum,
        })
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn value(&self) -> &Amount {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_sums_values() {
        let a = MmrData::leaf(&"a".to_string(), &Amount::from_int(3)).unwrap();
        let b = MmrData::leaf(&"b".to_string(), &Amount::from_int(4)).unwrap();
        let parent = MmrData::parent(&a, &b).unwrap();
        assert_eq!(parent.value(), &Amount::from_int(7));
    }

    #[test]
    fn test_parent_is_order_sensitive() {
        let a = MmrData::leaf(&"a".to_string(), &Amount::zero()).unwrap();
        let b = MmrData::leaf(&"b".to_string(), &Amount::zero()).unwrap();
        assert_ne!(
            MmrData::parent(&a, &b).unwrap().hash(),
            MmrData::parent(&b, &a).unwrap().hash()
        );
    }

    #[test]
    fn test_leaf_commits_to_value() {
        let one = MmrData::leaf(&"coin".to_string(), &Amount::from_int(1)).unwrap();
        let zero = MmrData::leaf(&"coin".to_string(), &Amount::zero()).unwrap();
        assert_ne!(one.hash(), zero.hash());
    }
}
