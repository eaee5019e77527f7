//! Client configuration
//!
//! Defaults, then `~/.shadowswap/config.json` (or an explicit path), then
//! `SHADOWSWAP_*` environment overrides. The result is validated before use.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::MAX_DECIMALS;
use crate::chain::{FinalityPolicy, RetryPolicy};
use crate::error::{ConfigError, RelayerError};
use crate::monitor::MonitorConfig;
use crate::relayer::{HttpRelayer, Relayer, SimulatedRelayer};
use crate::swap::{PoolAddresses, PoolId, TokenRegistry};

const CONFIG_DIR: &str = ".shadowswap";
const CONFIG_FILE: &str = "config.json";

pub const ENV_RELAYER_URL: &str = "SHADOWSWAP_RELAYER_URL";
pub const ENV_HMAC_SECRET: &str = "SHADOWSWAP_HMAC_SECRET";
pub const ENV_RPC_URL: &str = "SHADOWSWAP_RPC_URL";
pub const ENV_NETWORK: &str = "SHADOWSWAP_NETWORK";

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Sepolia,
}

impl Network {
    /// Chain id as the ledger chain reports it (short string `SN_MAIN` / `SN_SEPOLIA`)
    pub fn chain_id(&self) -> &'static str {
        match self {
            Network::Mainnet => "0x534e5f4d41494e",
            Network::Sepolia => "0x534e5f5345504f4c4941",
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://starknet-mainnet.public.blastapi.io",
            Network::Sepolia => "https://starknet-sepolia.public.blastapi.io",
        }
    }

    pub fn explorer_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://starkscan.co",
            Network::Sepolia => "https://sepolia.starkscan.co",
        }
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url(), tx_hash)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Sepolia => f.write_str("sepolia"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "sepolia" | "testnet" => Ok(Network::Sepolia),
            other => Err(ConfigError::Invalid(format!("unknown network {other:?}"))),
        }
    }
}

/// Which relayer implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayerBackend {
    #[default]
    Http,
    Simulated,
}

// ============================================================================
// Timing Sections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_backoff_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalitySettings {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FinalitySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            timeout_secs: 600,
        }
    }
}

// ============================================================================
// Client Config
// ============================================================================

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: Network,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    pub relayer_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmac_secret: Option<String>,
    pub relayer_backend: RelayerBackend,
    pub pools: PoolAddresses,
    pub tokens: TokenRegistry,
    pub default_pool: PoolId,
    pub monitor: MonitorSettings,
    pub retry: RetrySettings,
    pub finality: FinalitySettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            rpc_url: None,
            relayer_url: "http://localhost:8080".into(),
            hmac_secret: None,
            relayer_backend: RelayerBackend::default(),
            pools: PoolAddresses::default(),
            tokens: TokenRegistry::default(),
            default_pool: PoolId::default(),
            monitor: MonitorSettings::default(),
            retry: RetrySettings::default(),
            finality: FinalitySettings::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("relayer_url", &self.relayer_url)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("relayer_backend", &self.relayer_backend)
            .field("pools", &self.pools)
            .field("tokens", &self.tokens.len())
            .field("default_pool", &self.default_pool)
            .field("monitor", &self.monitor)
            .field("retry", &self.retry)
            .field("finality", &self.finality)
            .finish()
    }
}

impl ClientConfig {
    /// `~/.shadowswap/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load from `path` (missing file means defaults), apply process
    /// environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            ClientConfig::default()
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(network) = set(ENV_NETWORK) {
            self.network = network.parse()?;
        }
        if let Some(url) = set(ENV_RELAYER_URL) {
            self.relayer_url = url;
        }
        if let Some(url) = set(ENV_RPC_URL) {
            self.rpc_url = Some(url);
        }
        if let Some(secret) = set(ENV_HMAC_SECRET) {
            self.hmac_secret = Some(secret);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relayer_url.trim().is_empty() {
            return Err(ConfigError::Invalid("relayer_url is empty".into()));
        }
        if matches!(&self.rpc_url, Some(url) if url.trim().is_empty()) {
            return Err(ConfigError::Invalid("rpc_url is empty".into()));
        }
        if self.tokens.is_empty() {
            return Err(ConfigError::Invalid("token registry is empty".into()));
        }
        if let Some(token) = self.tokens.iter().find(|t| t.decimals > MAX_DECIMALS) {
            return Err(ConfigError::Invalid(format!(
                "{} has {} decimals (max {})",
                token.symbol, token.decimals, MAX_DECIMALS
            )));
        }
        if let Some(token) = self.tokens.iter().find(|t| t.chain.is_ledger() && t.address.is_none()) {
            return Err(ConfigError::Invalid(format!("{} has no contract address", token.symbol)));
        }
        if self.pools.fast.is_zero() || self.pools.standard.is_zero() {
            return Err(ConfigError::Invalid("pool address is zero".into()));
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("monitor.poll_interval_secs must be > 0".into()));
        }
        if self.finality.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("finality.poll_interval_ms must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }

    /// Write as pretty JSON, readable only by the owner on unix
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }
        Ok(())
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or_else(|| self.network.default_rpc_url())
    }

    pub fn token_registry(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn pool_addresses(&self) -> PoolAddresses {
        self.pools
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.monitor.poll_interval_secs),
            max_backoff: Duration::from_secs(self.monitor.max_backoff_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
        }
    }

    pub fn finality_policy(&self) -> FinalityPolicy {
        FinalityPolicy {
            poll_interval: Duration::from_millis(self.finality.poll_interval_ms),
            timeout: Duration::from_secs(self.finality.timeout_secs),
        }
    }

    /// Construct the configured relayer backend
    pub fn build_relayer(&self) -> Result<Relayer, RelayerError> {
        Ok(match self.relayer_backend {
            RelayerBackend::Http => Relayer::Http(HttpRelayer::new(&self.relayer_url, self.hmac_secret.clone())?),
            RelayerBackend::Simulated => Relayer::Simulated(SimulatedRelayer::new()),
        })
    }
}
