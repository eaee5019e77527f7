//! Swap parameter generation
//!
//! Produces the tuple that binds the two legs of a swap together:
//! - `secret`: 32 random bytes, revealed only at redemption
//! - `blinding_factor`: 32 random bytes, hides the amount inside the commitment
//! - `commitment = H(amount, blinding_factor)`: the pool leaf
//! - `hash_lock = SHA256(secret)`: checked by both chains' HTLC logic
//!
//! Security features:
//! - Randomness comes from the OS only; failure aborts, never degrades
//! - Secrets are zeroized on drop and redacted from `Debug`
//! - Hash-lock verification is constant time

use std::fmt;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use starknet_crypto::{poseidon_hash_many, Felt as StarkFelt};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::amount::U256;
use crate::error::CryptoError;
use crate::felt::Felt;

// ============================================================================
// Zeroizing Secret Wrapper
// ============================================================================

/// 32 secret bytes that are wiped on drop
#[derive(Clone)]
pub struct Secret {
    bytes: [u8; 32],
}

impl Secret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Draw 32 bytes from `rng`, failing if the source is unavailable
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomnessUnavailable(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Parse 64 hex digits, with or without `0x`
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let digits = strip_hex_prefix(s.trim());
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// `0x`-prefixed hex. The returned string is not zeroized.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for Secret {}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

// ============================================================================
// Commitment Schemes
// ============================================================================

/// Hash binding an amount to a blinding factor.
///
/// Must match exactly what the target pool contract verifies.
pub trait CommitmentScheme: Send + Sync {
    fn commit(&self, amount: &U256, blinding_factor: &Secret) -> Result<Felt, CryptoError>;
}

/// Starknet Poseidon over `[amount, blinding_factor]` (`poseidon_hash_many`).
///
/// This is what the pool contract and the relayer recompute. The amount must
/// fit a felt; the blinding factor is reduced modulo the field prime.
#[derive(Debug, Clone, Copy, Default)]
pub struct StarknetPoseidon;

impl CommitmentScheme for StarknetPoseidon {
    fn commit(&self, amount: &U256, blinding_factor: &Secret) -> Result<Felt, CryptoError> {
        let amount = Felt::from_bytes_be(amount.to_be_bytes())
            .map_err(|e| CryptoError::Commitment(format!("amount does not fit a felt: {e}")))?;
        let inputs = [
            StarkFelt::from_bytes_be(amount.as_bytes()),
            StarkFelt::from_bytes_be(blinding_factor.as_bytes()),
        ];
        let hash = poseidon_hash_many(&inputs);
        Felt::from_bytes_be(hash.to_bytes_be()).map_err(|e| CryptoError::Commitment(e.to_string()))
    }
}

/// Circom-compatible Poseidon over BN254 with two inputs (t = 3).
///
/// For pools built on BN254 circuits; select it with
/// `SwapOrchestrator::with_scheme`. The output is masked to 251 bits so it
/// is a valid Starknet felt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonBn254;

impl CommitmentScheme for PoseidonBn254 {
    fn commit(&self, amount: &U256, blinding_factor: &Secret) -> Result<Felt, CryptoError> {
        let amount_fr = Fr::from_be_bytes_mod_order(&amount.to_be_bytes());
        let blinding_fr = Fr::from_be_bytes_mod_order(blinding_factor.as_bytes());

        let mut hasher =
            Poseidon::<Fr>::new_circom(2).map_err(|e| CryptoError::Commitment(e.to_string()))?;
        let hash = hasher
            .hash(&[amount_fr, blinding_fr])
            .map_err(|e| CryptoError::Commitment(e.to_string()))?;

        Ok(Felt::from_bytes_be_masked(fr_to_bytes_be(&hash)))
    }
}

pub(crate) fn fr_to_bytes_be(value: &Fr) -> [u8; 32] {
    let repr = value.into_bigint().to_bytes_be();
    let mut bytes = [0u8; 32];
    bytes[32 - repr.len()..].copy_from_slice(&repr);
    bytes
}

// ============================================================================
// Swap Parameters
// ============================================================================

/// Everything the initiator must keep until the swap is redeemed or refunded.
///
/// Losing `secret` before redemption forfeits the funds.
#[derive(Debug, Clone)]
pub struct SwapParameters {
    pub secret: Secret,
    pub blinding_factor: Secret,
    pub commitment: Felt,
    /// SHA256(secret), lowercase hex without prefix
    pub hash_lock: String,
}

impl SwapParameters {
    /// Hash-lock shortened for log lines
    pub fn hash_lock_prefix(&self) -> &str {
        &self.hash_lock[..self.hash_lock.len().min(12)]
    }
}

/// Generate swap parameters for a base-unit amount using the OS RNG and
/// the default commitment scheme
pub fn generate_swap_parameters(amount: &str) -> Result<SwapParameters, CryptoError> {
    let amount = U256::from_dec_str(amount)?;
    generate_swap_parameters_with(&amount, &StarknetPoseidon, &mut OsRng)
}

/// Generate swap parameters with an explicit scheme and randomness source
pub fn generate_swap_parameters_with<S, R>(
    amount: &U256,
    scheme: &S,
    rng: &mut R,
) -> Result<SwapParameters, CryptoError>
where
    S: CommitmentScheme + ?Sized,
    R: RngCore + CryptoRng,
{
    let secret = Secret::random(rng)?;
    let blinding_factor = Secret::random(rng)?;
    let commitment = scheme.commit(amount, &blinding_factor)?;
    let hash_lock = compute_hash_lock(secret.as_bytes());

    Ok(SwapParameters {
        secret,
        blinding_factor,
        commitment,
        hash_lock,
    })
}

/// Starknet Poseidon commitment over a base-unit amount and a hex blinding factor
pub fn generate_commitment(amount: &str, blinding_factor: &str) -> Result<Felt, CryptoError> {
    let amount = U256::from_dec_str(amount)?;
    let blinding_factor = Secret::from_hex(blinding_factor)?;
    StarknetPoseidon.commit(&amount, &blinding_factor)
}

// ============================================================================
// Hash Lock
// ============================================================================

/// SHA256 over the raw secret bytes, hex without prefix
pub fn compute_hash_lock(secret: &[u8]) -> String {
    hex::encode(Sha256::digest(secret))
}

/// Check a revealed secret against a hash lock.
///
/// Either side may carry a `0x` prefix. Malformed input is simply a mismatch.
pub fn verify_secret(secret_hex: &str, hash_lock_hex: &str) -> bool {
    let Ok(secret) = hex::decode(strip_hex_prefix(secret_hex.trim())) else {
        return false;
    };
    let mut expected = [0u8; 32];
    if hex::decode_to_slice(strip_hex_prefix(hash_lock_hex.trim()), &mut expected).is_err() {
        return false;
    }

    let actual = Sha256::digest(&secret);
    actual.as_slice().ct_eq(&expected).into()
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}
