//! Encrypted swap-secret vault
//!
//! Uses AES-256-GCM for encryption and Argon2id for key derivation.
//! One file per swap under `~/.shadowswap/swaps/`. Only public swap data
//! (id, commitment, hash lock) is readable without the password; the secret
//! and blinding factor are never stored in plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{bail, Context, Result};
use argon2::{
    password_hash::{rand_core::RngCore, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use shadow_swap::crypto::SwapParameters;
use shadow_swap::orchestrator::SwapResult;

/// Argon2 parameters for key derivation
const ARGON2_M_COST: u32 = 65536; // 64 MB memory
const ARGON2_T_COST: u32 = 3; // 3 iterations
const ARGON2_P_COST: u32 = 4; // 4 parallel lanes

const FILE_EXTENSION: &str = "enc";

/// Password can come from here instead of a prompt (scripts, CI)
pub const PASSWORD_ENV: &str = "SHADOWSWAP_VAULT_PASSWORD";

/// Encrypted swap file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSwapFile {
    /// Version for future compatibility
    pub version: u8,
    pub swap_id: String,
    pub commitment: String,
    pub hash_lock: String,
    /// Set when the deposit is final but the relayer never registered the swap
    #[serde(default)]
    pub unregistered: bool,
    /// Salt for Argon2
    pub salt: String,
    /// Nonce for AES-GCM (base64)
    pub nonce: String,
    /// Encrypted [`SwapSecretData`] (base64)
    pub ciphertext: String,
    /// Password hash for verification (Argon2)
    pub password_hash: Option<String>,
    pub created_at: String,
}

/// Unencrypted swap data (internal use only)
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SwapSecretData {
    pub swap_id: String,
    pub direction: String,
    pub from_token: String,
    pub to_token: String,
    /// Base units of `from_token`
    pub amount: String,
    pub commitment: String,
    pub hash_lock: String,
    pub secret: [u8; 32],
    pub blinding_factor: [u8; 32],
    pub deposit_tx_hash: Option<String>,
}

impl SwapSecretData {
    pub fn from_result(result: &SwapResult) -> Self {
        Self {
            swap_id: result.swap_id.clone(),
            direction: result.direction.to_string(),
            from_token: result.from_token.clone(),
            to_token: result.to_token.clone(),
            amount: result.from_amount.to_string(),
            commitment: result.commitment.to_hex(),
            hash_lock: result.hash_lock.clone(),
            secret: *result.secret.as_bytes(),
            blinding_factor: *result.blinding_factor.as_bytes(),
            deposit_tx_hash: result.deposit_tx_hash.map(|h| h.to_hex()),
        }
    }

    /// Parameters of a swap whose deposit may sit in the pool unregistered.
    ///
    /// `deposit_tx_hash` is `None` when the submission itself failed mid-flight.
    pub fn from_unregistered(
        params: &SwapParameters,
        direction: &str,
        from_token: &str,
        to_token: &str,
        amount: &str,
        deposit_tx_hash: Option<&str>,
    ) -> Self {
        let commitment = params.commitment.to_hex();
        Self {
            swap_id: unregistered_id(&commitment),
            direction: direction.to_string(),
            from_token: from_token.to_string(),
            to_token: to_token.to_string(),
            amount: amount.to_string(),
            commitment,
            hash_lock: params.hash_lock.clone(),
            secret: *params.secret.as_bytes(),
            blinding_factor: *params.blinding_factor.as_bytes(),
            deposit_tx_hash: deposit_tx_hash.map(str::to_string),
        }
    }

    pub fn is_unregistered(&self) -> bool {
        self.swap_id.starts_with("unregistered_")
    }
}

fn unregistered_id(commitment_hex: &str) -> String {
    let digits = commitment_hex.trim_start_matches("0x");
    format!("unregistered_{}", &digits[..digits.len().min(16)])
}

fn argon2() -> Result<Argon2<'static>> {
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
            .map_err(|e| anyhow::anyhow!("Argon2 params error: {}", e))?,
    ))
}

fn cipher_for(argon2: &Argon2, password: &str, salt: &str) -> Result<Aes256Gcm> {
    let mut key_bytes = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut key_bytes)
        .map_err(|e| anyhow::anyhow!("Key derivation failed: {}", e))?;
    let cipher = Aes256Gcm::new_from_slice(&key_bytes)
        .map_err(|e| anyhow::anyhow!("Cipher creation failed: {}", e));
    key_bytes.zeroize();
    cipher
}

impl EncryptedSwapFile {
    /// Encrypt swap data with a password
    pub fn encrypt(data: &SwapSecretData, password: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = argon2()?;
        let cipher = cipher_for(&argon2, password, salt.as_str())?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let mut plaintext = serde_json::to_vec(data)?;
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e));
        plaintext.zeroize();
        let ciphertext = ciphertext?;

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .ok()
            .map(|h| h.to_string());

        Ok(Self {
            version: 1,
            swap_id: data.swap_id.clone(),
            commitment: data.commitment.clone(),
            hash_lock: data.hash_lock.clone(),
            unregistered: data.is_unregistered(),
            salt: salt.as_str().to_string(),
            nonce: b64::encode(&nonce_bytes),
            ciphertext: b64::encode(&ciphertext),
            password_hash,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Decrypt swap data with a password
    pub fn decrypt(&self, password: &str) -> Result<SwapSecretData> {
        if let Some(ref hash) = self.password_hash {
            let parsed_hash = argon2::PasswordHash::new(hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| anyhow::anyhow!("Invalid password"))?;
        }

        let cipher = cipher_for(&argon2()?, password, &self.salt)?;

        let nonce_bytes = b64::decode(&self.nonce).context("Invalid nonce encoding")?;
        let ciphertext = b64::decode(&self.ciphertext).context("Invalid ciphertext encoding")?;
        let nonce_array: [u8; 12] = nonce_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid nonce length"))?;
        let nonce = Nonce::from(nonce_array);

        let mut plaintext = cipher
            .decrypt(&nonce, ciphertext.as_ref())
            .map_err(|_| anyhow::anyhow!("Decryption failed - wrong password or corrupted data"))?;
        let data = serde_json::from_slice(&plaintext).context("Failed to parse decrypted swap data");
        plaintext.zeroize();
        data
    }
}

/// Swap secret storage manager
pub struct SwapVault {
    dir: PathBuf,
}

impl SwapVault {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, swap_id: &str) -> Result<PathBuf> {
        let valid = !swap_id.is_empty()
            && swap_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            bail!("Invalid swap id {:?}", swap_id);
        }
        Ok(self.dir.join(format!("{}.{}", swap_id, FILE_EXTENSION)))
    }

    pub fn exists(&self, swap_id: &str) -> bool {
        self.path_for(swap_id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Encrypt and write; refuses to overwrite an existing swap
    pub fn save(&self, data: &SwapSecretData, password: &str) -> Result<PathBuf> {
        let path = self.path_for(&data.swap_id)?;
        if path.exists() {
            bail!("Secrets for {} are already stored at {}", data.swap_id, path.display());
        }

        let encrypted = EncryptedSwapFile::encrypt(data, password)?;
        let json = serde_json::to_string_pretty(&encrypted)?;
        fs::create_dir_all(&self.dir).context("Failed to create swaps directory")?;

        // Write with restrictive permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::write(&path, &json)?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, &json)?;
        }

        Ok(path)
    }

    /// Public part of a stored swap, no password needed
    pub fn read(&self, swap_id: &str) -> Result<EncryptedSwapFile> {
        let path = self.path_for(swap_id)?;
        let json = fs::read_to_string(&path)
            .with_context(|| format!("No stored secrets for swap {}", swap_id))?;
        serde_json::from_str(&json).context("Failed to parse encrypted swap file")
    }

    pub fn load(&self, swap_id: &str, password: &str) -> Result<SwapSecretData> {
        self.read(swap_id)?.decrypt(password)
    }

    /// Every stored swap, newest first
    pub fn list(&self) -> Result<Vec<EncryptedSwapFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).context("Failed to read swaps directory")? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str::<EncryptedSwapFile>(&json) {
                Ok(file) => files.push(file),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable swap file"),
            }
        }
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }
}

/// Password strength validation
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_upper || !has_lower || !has_digit {
        bail!("Password must contain uppercase, lowercase, and numeric characters");
    }

    Ok(())
}

/// Prompt for password securely (hides input)
pub fn prompt_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Prompt for password with confirmation
pub fn prompt_new_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        validate_password_strength(&password)?;
        return Ok(password);
    }
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;

    if password != confirm {
        bail!("Passwords do not match");
    }

    validate_password_strength(&password)?;

    Ok(password)
}

// Base64 encoding/decoding helpers
mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(s: &str) -> anyhow::Result<Vec<u8>> {
        STANDARD.decode(s).map_err(|e| anyhow::anyhow!("Base64 decode error: {}", e))
    }
}
