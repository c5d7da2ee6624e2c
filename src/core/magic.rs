//! Adaptive consensus capacity ("Magic")
//!
//! Every header carries two parameter sets. `current` is binding: it limits
//! the block and is recomputed from the parent's `current` and this block's
//! `desired`. `desired` is whatever the producing node would like. Each block
//! moves `current` only 1/16384 of the way toward a desired value that has
//! already been limited to half or double the old value and to hard bounds.

use crate::core::proof_of_work::MAX_TARGET;
use crate::core::{Amount, Hash, ProofOfWork};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Weight of the previous value in the moving average
pub const MAGIC_WEIGHT: i64 = 16383;
/// Total weight of the moving average
pub const MAGIC_TOTAL: i64 = 16384;

pub const MIN_TXPOW_SIZE: i64 = 64 * 1024;
pub const MAX_TXPOW_SIZE: i64 = 16 * 1024 * 1024;
pub const MIN_SCRIPT_OPS: i64 = 1024;
pub const MAX_SCRIPT_OPS: i64 = 1024 * 1024;
pub const MIN_TXNS: i64 = 256;
pub const MAX_TXNS: i64 = 65536;

/// Mainnet floor for the work target: 10,000 hashes per unit on average
pub const MIN_HASHES: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct MagicValues {
    pub max_txpow_size: Amount,
    pub max_script_ops: Amount,
    pub max_txns: Amount,
    /// Largest hash a unit may have, so higher is easier
    pub min_work: Hash,
}

impl MagicValues {
    pub fn max_txpow_size(&self) -> u64 {
        self.max_txpow_size.floor_u64().unwrap_or(0)
    }

    pub fn max_script_ops(&self) -> u64 {
        self.max_script_ops.floor_u64().unwrap_or(0)
    }

    pub fn max_txns(&self) -> u64 {
        self.max_txns.floor_u64().unwrap_or(0)
    }
}

/// Hard limits no desired value can move past
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicBounds {
    pub txpow_size: (Amount, Amount),
    pub script_ops: (Amount, Amount),
    pub txns: (Amount, Amount),
    /// Easiest work target allowed
    pub easiest_work: BigUint,
}

impl MagicBounds {
    pub fn new(min_hashes: u64) -> MagicBounds {
        MagicBounds {
            txpow_size: (Amount::from_int(MIN_TXPOW_SIZE), Amount::from_int(MAX_TXPOW_SIZE)),
            script_ops: (Amount::from_int(MIN_SCRIPT_OPS), Amount::from_int(MAX_SCRIPT_OPS)),
            txns: (Amount::from_int(MIN_TXNS), Amount::from_int(MAX_TXNS)),
            easiest_work: ProofOfWork::from_hashes(min_hashes).target().to_biguint(),
        }
    }

    /// The floor values, which are also where a new chain starts
    pub fn defaults(&self) -> MagicValues {
        MagicValues {
            max_txpow_size: self.txpow_size.0.clone(),
            max_script_ops: self.script_ops.0.clone(),
            max_txns: self.txns.0.clone(),
            min_work: Hash::from_biguint(&self.easiest_work),
        }
    }
}

impl Default for MagicBounds {
    fn default() -> Self {
        MagicBounds::new(MIN_HASHES)
    }
}

fn clamp_amount(value: &Amount, low: &Amount, high: &Amount) -> Amount {
    if value < low {
        low.clone()
    } else if value > high {
        high.clone()
    } else {
        value.clone()
    }
}

fn next_amount(old: &Amount, desired: &Amount, bounds: &(Amount, Amount)) -> Amount {
    let two = Amount::from_int(2);
    let half = old.checked_div(&two).unwrap_or_default();
    let double = old.mul(&two);
    let limited = clamp_amount(desired, &half, &double);
    let limited = clamp_amount(&limited, &bounds.0, &bounds.1);

    let weighted = old.mul(&Amount::from_int(MAGIC_WEIGHT)) + limited;
    weighted
        .checked_div(&Amount::from_int(MAGIC_TOTAL))
        .unwrap_or_else(|_| old.clone())
}

fn next_work(old: &Hash, desired: &Hash, easiest: &BigUint) -> Hash {
    let old = old.to_biguint();
    let half = &old >> 1usize;
    let double = &old << 1usize;

    let mut limited = desired.to_biguint();
    if limited < half {
        limited = half;
    } else if limited > double {
        limited = double;
    }
    if limited > *easiest {
        limited = easiest.clone();
    }

    let weighted = old * BigUint::from(MAGIC_WEIGHT as u64) + limited;
    let next = weighted / BigUint::from(MAGIC_TOTAL as u64);
    Hash::from_biguint(&next.min(MAX_TARGET.clone()))
}

/// The binding values for a block, from its parent's binding values and the
/// block's own desired values
pub fn calculate_new_current(
    previous: &MagicValues,
    desired: &MagicValues,
    bounds: &MagicBounds,
) -> MagicValues {
    MagicValues {
        max_txpow_size: next_amount(&previous.max_txpow_size, &desired.max_txpow_size, &bounds.txpow_size),
        max_script_ops: next_amount(&previous.max_script_ops, &desired.max_script_ops, &bounds.script_ops),
        max_txns: next_amount(&previous.max_txns, &desired.max_txns, &bounds.txns),
        min_work: next_work(&previous.min_work, &desired.min_work, &bounds.easiest_work),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Magic {
    current: MagicValues,
    desired: MagicValues,
}

impl Magic {
    pub fn new(current: MagicValues, desired: MagicValues) -> Magic {
        Magic { current, desired }
    }

    /// Starting parameters of a chain
    pub fn genesis(bounds: &MagicBounds) -> Magic {
        Magic {
            current: bounds.defaults(),
            desired: bounds.defaults(),
        }
    }

    /// Parameters for a child of the block carrying `self`
    pub fn next(&self, desired: MagicValues, bounds: &MagicBounds) -> Magic {
        Magic {
            current: calculate_new_current(&self.current, &desired, bounds),
            desired,
        }
    }

    pub fn current(&self) -> &MagicValues {
        &self.current
    }

    pub fn desired(&self) -> &MagicValues {
        &self.desired
    }

    pub fn set_desired(&mut self, desired: MagicValues) {
        self.desired = desired;
    }

    /// Only the binding values matter for consensus
    pub fn check_same(&self, other: &Magic) -> bool {
        self.current == other.current
    }

    pub fn min_work(&self) -> ProofOfWork {
        ProofOfWork::new(&self.current.min_work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> MagicBounds {
        MagicBounds::default()
    }

    #[test]
    fn test_defaults_are_floors() {
        let magic = Magic::genesis(&bounds());
        assert_eq!(magic.current().max_txpow_size(), 64 * 1024);
        assert_eq!(magic.current().max_script_ops(), 1024);
        assert_eq!(magic.current().max_txns(), 256);
    }

    #[test]
    fn test_drift_is_weighted() {
        let b = bounds();
        let magic = Magic::genesis(&b);
        let mut desired = b.defaults();
        desired.max_script_ops = Amount::from_int(2048);

        let next = magic.next(desired, &b);
        // (1024 * 16383 + 2048) / 16384 = 1024.0625
        assert_eq!(next.current().max_script_ops, "1024.0625".parse().unwrap());
        assert_eq!(next.current().max_script_ops(), 1024);
    }

    #[test]
    fn test_desired_is_doubled_at_most() {
        let b = bounds();
        let magic = Magic::genesis(&b);
        let mut wild = b.defaults();
        wild.max_txns = Amount::from_int(60_000);
        let mut double = b.defaults();
        double.max_txns = Amount::from_int(512);

        assert_eq!(
            magic.next(wild, &b).current().max_txns,
            magic.next(double, &b).current().max_txns
        );
    }

    #[test]
    fn test_floor_cannot_be_crossed() {
        let b = bounds();
        let mut magic = Magic::genesis(&b);
        let mut low = b.defaults();
        low.max_txpow_size = Amount::from_int(1);
        low.min_work = Hash::MAX;

        for _ in 0..50 {
            magic = magic.next(low.clone(), &b);
            assert!(magic.current().max_txpow_size >= Amount::from_int(MIN_TXPOW_SIZE));
            assert!(magic.current().min_work.to_biguint() <= b.easiest_work);
        }
    }

    #[test]
    fn test_bounded_per_block() {
        let b = bounds();
        let mut magic = Magic::genesis(&b);
        let sequence = [1i64, 5_000_000, 300, 99_999_999, 65536];
        for value in sequence {
            let before = magic.current().max_txpow_size.clone();
            let mut desired = b.defaults();
            desired.max_txpow_size = Amount::from_int(value);
            magic = magic.next(desired, &b);
            let after = &magic.current().max_txpow_size;
            assert!(*after <= before.mul(&Amount::from_int(2)));
            assert!(*after >= before.checked_div(&Amount::from_int(2)).unwrap());
            assert!(*after <= Amount::from_int(MAX_TXPOW_SIZE));
        }
    }

    #[test]
    fn test_harder_work_drifts_down() {
        let b = bounds();
        let magic = Magic::genesis(&b);
        let mut desired = b.defaults();
        desired.min_work = Hash::ZERO;
        let next = magic.next(desired, &b);
        assert!(next.current().min_work.to_biguint() < b.easiest_work);
    }

    #[test]
    fn test_check_same_ignores_desired() {
        let b = bounds();
        let a = Magic::genesis(&b);
        let mut c = a.clone();
        let mut desired = b.defaults();
        desired.max_txns = Amount::from_int(300);
        c.set_desired(desired);
        assert!(a.check_same(&c));
    }
}
