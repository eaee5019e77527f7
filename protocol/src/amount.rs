//! Amount codec
//!
//! Converts between human-readable decimal strings and base-unit integers,
//! and between base units and the two 128-bit limbs Cairo uses for `u256`.
//!
//! All conversions are string based. Amounts never pass through floating point.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AmountError;
use crate::felt::Felt;

/// Largest decimals value whose scale factor fits in 256 bits (10^77 < 2^256)
pub const MAX_DECIMALS: u32 = 77;

// ============================================================================
// Decimal <-> Base Units
// ============================================================================

/// Convert a decimal string into a base-unit integer string.
///
/// The fractional part is padded or truncated to `decimals` digits. Leading
/// zeros are stripped. Empty input yields `"0"`.
///
/// ```
/// use shadow_swap::to_base_units;
/// assert_eq!(to_base_units("1.5", 18).unwrap(), "1500000000000000000");
/// ```
pub fn to_base_units(amount: &str, decimals: u32) -> Result<String, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::TooManyDecimals(decimals));
    }

    let amount = amount.trim();
    if amount.is_empty() {
        return Ok("0".to_string());
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !is_digits(fraction) || (whole.is_empty() && fraction.is_empty()) {
        return Err(AmountError::NonNumeric(amount.to_string()));
    }

    let decimals = decimals as usize;
    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    if fraction.len() >= decimals {
        digits.push_str(&fraction[..decimals]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(decimals - fraction.len()));
    }

    Ok(strip_leading_zeros(&digits))
}

/// Convert a base-unit integer string back into a canonical decimal string.
///
/// Trailing fractional zeros are removed, and the decimal point is omitted
/// when nothing remains after it.
pub fn from_base_units(base_units: &str, decimals: u32) -> Result<String, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::TooManyDecimals(decimals));
    }

    let base_units = base_units.trim();
    if base_units.is_empty() || !base_units.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::NonNumeric(base_units.to_string()));
    }

    let decimals = decimals as usize;
    let digits = strip_leading_zeros(base_units);
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        Ok(whole.to_string())
    } else {
        Ok(format!("{}.{}", whole, fraction))
    }
}

/// Render base units for display with at most `max_fraction_digits` decimals.
///
/// Digits beyond the limit are truncated, never rounded up, so a displayed
/// balance is never more than what is actually held.
pub fn format_token_amount(
    base_units: &str,
    decimals: u32,
    max_fraction_digits: usize,
) -> Result<String, AmountError> {
    let canonical = from_base_units(base_units, decimals)?;
    let Some((whole, fraction)) = canonical.split_once('.') else {
        return Ok(canonical);
    };

    let kept = &fraction[..fraction.len().min(max_fraction_digits)];
    let kept = kept.trim_end_matches('0');
    if kept.is_empty() {
        Ok(whole.to_string())
    } else {
        Ok(format!("{}.{}", whole, kept))
    }
}

/// Parse a decimal amount straight into a [`U256`] of base units
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256, AmountError> {
    U256::from_dec_str(&to_base_units(amount, decimals)?)
}

/// Exact product of two non-negative decimal strings, as a canonical decimal.
///
/// ```
/// use shadow_swap::amount::multiply_decimal;
/// assert_eq!(multiply_decimal("10", "0.024").unwrap(), "0.24");
/// ```
pub fn multiply_decimal(a: &str, b: &str) -> Result<String, AmountError> {
    let (a_digits, a_scale) = split_decimal(a)?;
    let (b_digits, b_scale) = split_decimal(b)?;
    let product = a_digits * b_digits;
    from_base_units(&product.to_string(), a_scale + b_scale)
}

fn split_decimal(amount: &str) -> Result<(BigUint, u32), AmountError> {
    let amount = amount.trim();
    let scale = amount.split_once('.').map_or(0, |(_, f)| f.len());
    let scale = u32::try_from(scale).map_err(|_| AmountError::TooManyDecimals(u32::MAX))?;
    let digits = to_base_units(amount, scale)?;
    let digits = digits
        .parse::<BigUint>()
        .map_err(|_| AmountError::NonNumeric(amount.to_string()))?;
    Ok((digits, scale))
}

fn strip_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// U256
// ============================================================================

/// Unsigned 256-bit integer held as two 128-bit limbs.
///
/// Field order is `high` then `low` so the derived ordering is numeric.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct U256 {
    high: u128,
    low: u128,
}

impl U256 {
    pub const ZERO: U256 = U256 { high: 0, low: 0 };
    pub const MAX: U256 = U256 {
        high: u128::MAX,
        low: u128::MAX,
    };

    pub fn from_limbs(low: u128, high: u128) -> Self {
        U256 { high, low }
    }

    pub fn low(&self) -> u128 {
        self.low
    }

    pub fn high(&self) -> u128 {
        self.high
    }

    pub fn is_zero(&self) -> bool {
        self.low == 0 && self.high == 0
    }

    /// Parse a base-unit decimal integer, rejecting anything at or above 2^256
    pub fn from_dec_str(s: &str) -> Result<Self, AmountError> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::NonNumeric(s.to_string()));
        }
        let value = BigUint::from_str(s).map_err(|_| AmountError::NonNumeric(s.to_string()))?;
        Self::from_biguint(&value)
    }

    pub fn from_biguint(value: &BigUint) -> Result<Self, AmountError> {
        if value.bits() > 256 {
            return Err(AmountError::Overflow(value.to_string()));
        }
        let mut bytes = [0u8; 32];
        let raw = value.to_bytes_be();
        bytes[32 - raw.len()..].copy_from_slice(&raw);
        Ok(Self::from_be_bytes(bytes))
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.to_be_bytes())
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut high = [0u8; 16];
        let mut low = [0u8; 16];
        high.copy_from_slice(&bytes[..16]);
        low.copy_from_slice(&bytes[16..]);
        U256 {
            high: u128::from_be_bytes(high),
            low: u128::from_be_bytes(low),
        }
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&self.high.to_be_bytes());
        bytes[16..].copy_from_slice(&self.low.to_be_bytes());
        bytes
    }

    /// `(low, high)` as minimal `0x` hex strings
    pub fn to_hex_limbs(&self) -> (String, String) {
        (format!("{:#x}", self.low), format!("{:#x}", self.high))
    }

    /// `(low, high)` as calldata words
    pub fn to_felts(&self) -> (Felt, Felt) {
        (Felt::from_u128(self.low), Felt::from_u128(self.high))
    }

    /// Rebuild from `(low, high)` calldata words. Each limb must fit in 128 bits.
    pub fn from_felts(low: &Felt, high: &Felt) -> Option<Self> {
        Some(U256 {
            low: low.to_u128()?,
            high: high.to_u128()?,
        })
    }

    pub fn checked_add(self, rhs: U256) -> Option<U256> {
        let (low, carry) = self.low.overflowing_add(rhs.low);
        let high = self.high.checked_add(rhs.high)?.checked_add(carry as u128)?;
        Some(U256 { high, low })
    }

    pub fn checked_sub(self, rhs: U256) -> Option<U256> {
        if self < rhs {
            return None;
        }
        let (low, borrow) = self.low.overflowing_sub(rhs.low);
        let high = self.high - rhs.high - borrow as u128;
        Some(U256 { high, low })
    }
}

/// Split a base-unit decimal string into `(low, high)` 128-bit limbs.
///
/// Values of 2^256 or more are an error, never truncated.
pub fn split_u256(amount: &str) -> Result<(u128, u128), AmountError> {
    let value = U256::from_dec_str(amount)?;
    Ok((value.low, value.high))
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        U256 { high: 0, low: value }
    }
}

impl From<u64> for U256 {
    fn from(value: u64) -> Self {
        U256::from(value as u128)
    }
}

impl FromStr for U256 {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}", self.to_biguint())
        }
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

// Decimal strings on the wire, like every other base-unit amount
impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}
