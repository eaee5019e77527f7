//! Starknet field elements
//!
//! A felt is an integer below `P = 2^251 + 17 * 2^192 + 1`. Contract
//! addresses, transaction hashes, commitments and every calldata word are felts.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::FeltError;

/// Field modulus, big-endian
const MODULUS: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// Ledger-chain field element, stored big-endian
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Felt([u8; 32]);

impl Felt {
    pub const ZERO: Felt = Felt([0u8; 32]);
    pub const ONE: Felt = Felt::from_u64_const(1);

    const fn from_u64_const(value: u64) -> Self {
        let b = value.to_be_bytes();
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < 8 {
            bytes[24 + i] = b[i];
            i += 1;
        }
        Felt(bytes)
    }

    /// Create from big-endian bytes, rejecting values not below the modulus
    pub fn from_bytes_be(bytes: [u8; 32]) -> Result<Self, FeltError> {
        if bytes >= MODULUS {
            return Err(FeltError::OutOfRange(format!("0x{}", hex::encode(bytes))));
        }
        Ok(Felt(bytes))
    }

    /// Keep the low 251 bits. Always yields a valid felt.
    pub fn from_bytes_be_masked(mut bytes: [u8; 32]) -> Self {
        bytes[0] &= 0x07;
        Felt(bytes)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Felt(bytes)
    }

    /// Parse `0x`-prefixed or bare hex, any length up to 64 digits
    pub fn from_hex(s: &str) -> Result<Self, FeltError> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if digits.is_empty() || digits.len() > 64 {
            return Err(FeltError::InvalidHex(s.to_string()));
        }
        let padded = format!("{:0>64}", digits);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|_| FeltError::InvalidHex(s.to_string()))?;
        Self::from_bytes_be(bytes)
    }

    pub fn from_biguint(value: &BigUint) -> Result<Self, FeltError> {
        let raw = value.to_bytes_be();
        if raw.len() > 32 {
            return Err(FeltError::OutOfRange(value.to_string()));
        }
        let mut bytes = [0u8; 32];
        bytes[32 - raw.len()..].copy_from_slice(&raw);
        Self::from_bytes_be(bytes)
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// The value as a u128, if it fits
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Minimal `0x` hex, as the JSON-RPC API returns felts
    pub fn to_hex(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }

    /// `0x` followed by all 64 hex digits
    pub fn to_fixed_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Entry point selector: keccak256 of the name, truncated to 250 bits
    pub fn selector(name: &str) -> Self {
        let digest = Keccak256::digest(name.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        bytes[0] &= 0x03;
        Felt(bytes)
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt::from_u128(value)
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt::from_u128(value as u128)
    }
}

impl From<bool> for Felt {
    fn from(value: bool) -> Self {
        if value {
            Felt::ONE
        } else {
            Felt::ZERO
        }
    }
}

impl FromStr for Felt {
    type Err = FeltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Felt::from_hex(s)
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Felt::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
