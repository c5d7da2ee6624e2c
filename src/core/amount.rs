//! Decimal amounts with exact consensus arithmetic
//!
//! An [`Amount`] is a fixed-point decimal: a `BigInt` mantissa scaled by
//! `10^44`. Addition, subtraction and comparison are exact. Multiplication and
//! division truncate toward zero at the 44th decimal place, which every node
//! does identically.

use crate::error::{LedgerError, Result};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use num_bigint::{BigInt, Sign};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Digits kept after the decimal point
pub const DECIMAL_PLACES: u32 = 44;

/// Largest valid native amount
pub const MAX_NATIVE_COINS: i64 = 1_000_000_000;

/// Most digits the mantissa may have, the 44 decimals included. A native
/// amount needs at most 54, which leaves room for tokens scaled by up to 10^10.
pub const MAX_DIGITS: usize = 64;

static SCALE: Lazy<BigInt> = Lazy::new(|| pow10(DECIMAL_PLACES));

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u8).pow(exp)
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigInt);

impl Amount {
    pub fn zero() -> Amount {
        Amount(BigInt::from(0u8))
    }

    pub fn from_int(value: i64) -> Amount {
        Amount(BigInt::from(value) * &*SCALE)
    }

    pub fn max_native() -> Amount {
        Amount::from_int(MAX_NATIVE_COINS)
    }

    pub fn mantissa(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.sign() == Sign::NoSign
    }

    pub fn is_negative(&self) -> bool {
        self.0.sign() == Sign::Minus
    }

    /// Decimal digits in the mantissa, 0 for zero
    pub fn digits(&self) -> usize {
        if self.is_zero() {
            return 0;
        }
        self.0.magnitude().to_str_radix(10).len()
    }

    /// Fits in [`MAX_DIGITS`]
    pub fn is_representable(&self) -> bool {
        self.digits() <= MAX_DIGITS
    }

    /// Non-negative and no larger than the total native supply
    pub fn is_valid_native(&self) -> bool {
        !self.is_negative() && *self <= Amount::max_native()
    }

    pub fn mul(&self, other: &Amount) -> Amount {
        Amount((&self.0 * &other.0) / &*SCALE)
    }

    pub fn checked_div(&self, other: &Amount) -> Result<Amount> {
        if other.is_zero() {
            return Err(LedgerError::Malformed("Division by zero amount".to_string()));
        }
        Ok(Amount((&self.0 * &*SCALE) / &other.0))
    }

    /// Whole part, for amounts used as counts and sizes
    pub fn floor_u64(&self) -> Option<u64> {
        if self.is_negative() {
            return None;
        }
        u64::try_from(&self.0 / &*SCALE).ok()
    }

    /// Multiply by `10^exp`. Digits shifted past the last decimal place are
    /// never produced since the shift only moves them left.
    pub fn mul_pow10(&self, exp: u32) -> Amount {
        Amount(&self.0 * pow10(exp))
    }

    /// Divide by `10^exp`, failing if any digit would be lost
    pub fn div_pow10_exact(&self, exp: u32) -> Result<Amount> {
        let divisor = pow10(exp);
        let remainder = &self.0 % &divisor;
        if remainder.sign() != Sign::NoSign {
            return Err(LedgerError::InvalidTransaction(format!(
                "{self} cannot be divided by 10^{exp} without losing precision"
            )));
        }
        Ok(Amount(&self.0 / divisor))
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::zero()
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount::from_int(value)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn add(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn sub(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 - &rhs.0)
    }
}

impl SubAssign<&Amount> for Amount {
    fn sub_assign(&mut self, rhs: &Amount) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |acc, x| &acc + x)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.is_negative();
        let magnitude = if negative { -&self.0 } else { self.0.clone() };
        let int_part = &magnitude / &*SCALE;
        let frac_part = &magnitude % &*SCALE;

        let sign = if negative { "-" } else { "" };
        if frac_part.sign() == Sign::NoSign {
            return write!(f, "{sign}{int_part}");
        }
        let frac = format!("{:0>width$}", frac_part.to_string(), width = DECIMAL_PLACES as usize);
        write!(f, "{sign}{int_part}.{}", frac.trim_end_matches('0'))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({self})")
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || LedgerError::Malformed(format!("Invalid amount: {s}"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_str, frac_str) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_str.is_empty() && frac_str.is_empty() {
            return Err(bad());
        }
        let all_digits = |x: &str| x.chars().all(|c| c.is_ascii_digit());
        if !all_digits(int_str) || !all_digits(frac_str) {
            return Err(bad());
        }
        if frac_str.len() > DECIMAL_PLACES as usize {
            return Err(LedgerError::Malformed(format!(
                "Amount {s} has more than {DECIMAL_PLACES} decimal places"
            )));
        }

        let int_value = if int_str.is_empty() {
            BigInt::from(0u8)
        } else {
            BigInt::from_str(int_str).map_err(|_| bad())?
        };
        let frac_padded = format!("{frac_str:0<width$}", width = DECIMAL_PLACES as usize);
        let frac_value = BigInt::from_str(&frac_padded).map_err(|_| bad())?;

        let mantissa = int_value * &*SCALE + frac_value;
        Ok(Amount(if negative { -mantissa } else { mantissa }))
    }
}

// Encoded as a sign byte followed by the big-endian magnitude, so zero is a
// single sign byte and an empty magnitude.
impl Encode for Amount {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        let (sign, magnitude) = self.0.to_bytes_be();
        let (tag, magnitude): (i8, Vec<u8>) = match sign {
            Sign::NoSign => (0, Vec::new()),
            Sign::Plus => (1, magnitude),
            Sign::Minus => (-1, magnitude),
        };
        tag.encode(encoder)?;
        magnitude.encode(encoder)
    }
}

impl<Context> Decode<Context> for Amount {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> std::result::Result<Self, DecodeError> {
        let tag = i8::decode(decoder)?;
        let magnitude = Vec::<u8>::decode(decoder)?;
        let canonical = match tag {
            0 => magnitude.is_empty(),
            1 | -1 => magnitude.first().is_some_and(|b| *b != 0),
            _ => false,
        };
        if !canonical {
            return Err(DecodeError::OtherString(format!(
                "Non-canonical amount encoding (sign {tag})"
            )));
        }
        let sign = match tag {
            1 => Sign::Plus,
            -1 => Sign::Minus,
            _ => Sign::NoSign,
        };
        Ok(Amount(BigInt::from_bytes_be(sign, &magnitude)))
    }
}

bincode::impl_borrow_decode!(Amount);

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{deserialize, serialize};

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(amt("10").to_string(), "10");
        assert_eq!(amt("0.5").to_string(), "0.5");
        assert_eq!(amt("-3.250").to_string(), "-3.25");
        assert_eq!(amt(".75").to_string(), "0.75");
        assert_eq!(amt("0").to_string(), "0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        let too_precise = format!("0.{}", "1".repeat(45));
        assert!(too_precise.parse::<Amount>().is_err());
    }

    #[test]
    fn test_exact_arithmetic() {
        let a = amt("0.1");
        let b = amt("0.2");
        assert_eq!(&a + &b, amt("0.3"));
        assert_eq!(amt("10") - amt("7"), amt("3"));
        assert!(amt("7") < amt("10"));
    }

    #[test]
    fn test_division_truncates() {
        let third = amt("1").checked_div(&amt("3")).unwrap();
        let expected = format!("0.{}", "3".repeat(44));
        assert_eq!(third.to_string(), expected);
        assert!(amt("1").checked_div(&Amount::zero()).is_err());
    }

    #[test]
    fn test_pow10_scaling() {
        let native = amt("1.5");
        let scaled = native.mul_pow10(8);
        assert_eq!(scaled, amt("150000000"));
        assert_eq!(scaled.div_pow10_exact(8).unwrap(), native);

        let tiny = Amount(BigInt::from(1u8));
        assert!(tiny.div_pow10_exact(1).is_err());
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(Amount::zero().digits(), 0);
        assert_eq!(amt("1").digits(), 45);
        assert_eq!(amt("-1").digits(), 45);
        assert_eq!(Amount::max_native().digits(), 54);
        assert!(Amount::max_native().mul_pow10(10).is_representable());
        assert!(!Amount::max_native().mul_pow10(11).is_representable());
    }

    #[test]
    fn test_native_validity() {
        assert!(amt("0").is_valid_native());
        assert!(Amount::max_native().is_valid_native());
        assert!(!amt("1000000000.1").is_valid_native());
        assert!(!amt("-1").is_valid_native());
    }

    #[test]
    fn test_encoding_is_canonical() {
        for value in ["0", "12.5", "-4", "1000000000"] {
            let original = amt(value);
            let bytes = serialize(&original).unwrap();
            let decoded: Amount = deserialize(&bytes).unwrap();
            assert_eq!(original, decoded);
        }
        // sign says zero but a magnitude follows
        let forged = vec![0u8, 1, 5];
        assert!(deserialize::<Amount>(&forged).is_err());
    }
}
