// Proof-of-work here is only ever checked, never searched for. A target is a
// 256-bit hash value; an id meets it when id <= target read as big-endian
// integers. The smaller the target the more work a block represents.

use crate::core::Hash;
use num_bigint::BigUint;
use once_cell::sync::Lazy;

/// 2^256 - 1, the size of the hash space
pub static MAX_TARGET: Lazy<BigUint> =
    Lazy::new(|| (BigUint::from(1u8) << 256usize) - BigUint::from(1u8));

/// Fractional bits in a weight. Targets just under the maximum still weigh
/// more than the maximum instead of rounding down to the same whole number.
pub const WEIGHT_FRACTION_BITS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    target: BigUint,
}

impl ProofOfWork {
    pub fn new(target: &Hash) -> ProofOfWork {
        ProofOfWork {
            target: target.to_biguint(),
        }
    }

    /// Target that takes `hashes` attempts to meet on average
    pub fn from_hashes(hashes: u64) -> ProofOfWork {
        let hashes = BigUint::from(hashes.max(1));
        ProofOfWork {
            target: &*MAX_TARGET / hashes,
        }
    }

    pub fn target(&self) -> Hash {
        Hash::from_biguint(&self.target)
    }

    pub fn is_met_by(&self, id: &Hash) -> bool {
        id.to_biguint() <= self.target
    }

    /// Expected number of hashes to meet this target, which is the weight a
    /// block mined against it adds to its chain. Fixed point with
    /// [`WEIGHT_FRACTION_BITS`] fractional bits.
    pub fn weight(&self) -> BigUint {
        let target = if self.target == BigUint::from(0u8) {
            BigUint::from(1u8)
        } else {
            self.target.clone()
        };
        (&*MAX_TARGET << WEIGHT_FRACTION_BITS) / target
    }

    /// How many times over (as a power of two) the id beats the target,
    /// capped at `levels - 1`. An id that misses the target is level 0.
    pub fn super_level(&self, id: &Hash, levels: usize) -> usize {
        let value = id.to_biguint();
        if value > self.target || levels == 0 {
            return 0;
        }
        let value = if value == BigUint::from(0u8) {
            BigUint::from(1u8)
        } else {
            value
        };
        let ratio = &self.target / value;
        let bits = ratio.bits() as usize;
        bits.saturating_sub(1).min(levels - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_check() {
        let pow = ProofOfWork::new(&Hash::from_biguint(&BigUint::from(1000u32)));
        assert!(pow.is_met_by(&Hash::from_biguint(&BigUint::from(999u32))));
        assert!(pow.is_met_by(&Hash::from_biguint(&BigUint::from(1000u32))));
        assert!(!pow.is_met_by(&Hash::from_biguint(&BigUint::from(1001u32))));
    }

    #[test]
    fn test_weight_grows_with_difficulty() {
        let one = BigUint::from(1u8) << WEIGHT_FRACTION_BITS;
        let easy = ProofOfWork::new(&Hash::MAX);
        assert_eq!(easy.weight(), one);

        let harder = ProofOfWork::from_hashes(1_000);
        assert!(harder.weight() >= &one * 1_000u32);
        assert!(harder.weight() > easy.weight());
    }

    #[test]
    fn test_weight_keeps_fractions() {
        // a thousandth harder than the easiest target
        let max = Hash::MAX.to_biguint();
        let slightly = ProofOfWork::new(&Hash::from_biguint(&(&max - &max / 1_000u32)));
        let easy = ProofOfWork::new(&Hash::MAX);
        assert!(slightly.weight() > easy.weight());
        assert!(slightly.weight() < easy.weight() * 2u32);
    }

    #[test]
    fn test_super_level() {
        let pow = ProofOfWork::new(&Hash::from_biguint(&BigUint::from(1024u32)));
        let levels = 32;
        assert_eq!(pow.super_level(&Hash::from_biguint(&BigUint::from(2000u32)), levels), 0);
        assert_eq!(pow.super_level(&Hash::from_biguint(&BigUint::from(1024u32)), levels), 0);
        assert_eq!(pow.super_level(&Hash::from_biguint(&BigUint::from(512u32)), levels), 1);
        assert_eq!(pow.super_level(&Hash::from_biguint(&BigUint::from(100u32)), levels), 3);
        assert_eq!(pow.super_level(&Hash::ZERO, 4), 3);
    }
}
