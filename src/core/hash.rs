//! Fixed-length hash values
//!
//! Every identifier in the ledger (coin ids, addresses, token ids, transaction
//! and block ids, MMR node hashes) is a 32-byte SHA-256 digest. Hashes double as
//! proof-of-work targets, read as big-endian unsigned integers.

use crate::error::{LedgerError, Result};
use crate::utils::{serialize, sha256_digest, sha256_digest_parts};
use data_encoding::HEXUPPER;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const HASH_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Native token id, empty link hash, genesis super parents
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    /// Token id placeholder for an output that creates a new token
    pub const TOKEN_CREATE: Hash = Hash([0xFFu8; HASH_LEN]);

    /// The easiest possible target
    pub const MAX: Hash = Hash([0xFFu8; HASH_LEN]);

    pub fn digest(data: &[u8]) -> Hash {
        Hash(sha256_digest(data))
    }

    pub fn digest_parts(parts: &[&[u8]]) -> Hash {
        Hash(sha256_digest_parts(parts))
    }

    /// Hash of the byte encoding of any entity
    pub fn of<T: bincode::Encode>(value: &T) -> Result<Hash> {
        Ok(Hash::digest(&serialize(value)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Read a raw 32-byte value, as stored in a database key or value
    pub fn from_slice(bytes: &[u8]) -> Result<Hash> {
        let array: [u8; HASH_LEN] = bytes.try_into().map_err(|_| {
            LedgerError::Malformed(format!("Hash must be {HASH_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Hash(array))
    }

    pub fn is_zero(&self) -> bool {
        *self == Hash::ZERO
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Values wider than 256 bits saturate to [`Hash::MAX`]
    pub fn from_biguint(value: &BigUint) -> Hash {
        let bytes = value.to_bytes_be();
        if bytes.len() > HASH_LEN {
            return Hash::MAX;
        }
        let mut out = [0u8; HASH_LEN];
        out[HASH_LEN - bytes.len()..].copy_from_slice(&bytes);
        Hash(out)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", HEXUPPER.encode(&self.0))
    }

    pub fn short(&self) -> String {
        let hex = HEXUPPER.encode(&self.0);
        format!("0x{}..", &hex[..12])
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::ZERO
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = HEXUPPER
            .decode(hex.to_uppercase().as_bytes())
            .map_err(|e| LedgerError::Malformed(format!("Invalid hash hex {s}: {e}")))?;
        if bytes.len() != HASH_LEN {
            return Err(LedgerError::Malformed(format!(
                "Hash must be {HASH_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash::digest(b"coin");
        let parsed: Hash = hash.to_hex().parse().unwrap();
        assert_eq!(hash, parsed);

        let lower: Hash = hash.to_hex().to_lowercase().parse().unwrap();
        assert_eq!(hash, lower);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("0x00FF".parse::<Hash>().is_err());
        assert!("0xZZ".parse::<Hash>().is_err());
    }

    #[test]
    fn test_biguint_conversion() {
        let one = Hash::from_biguint(&BigUint::from(1u8));
        assert_eq!(one.0[HASH_LEN - 1], 1);
        assert_eq!(one.to_biguint(), BigUint::from(1u8));

        let too_big = BigUint::from(1u8) << 300;
        assert_eq!(Hash::from_biguint(&too_big), Hash::MAX);
    }

    #[test]
    fn test_from_slice() {
        let hash = Hash::digest(b"stored");
        assert_eq!(Hash::from_slice(hash.as_bytes()).unwrap(), hash);
        assert!(Hash::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_reserved_values_differ() {
        assert_ne!(Hash::ZERO, Hash::TOKEN_CREATE);
        assert!(Hash::ZERO.is_zero());
    }
}
