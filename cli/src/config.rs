//! Configuration and data directory for the Shadow Swap CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shadow_swap::config::{ClientConfig, RelayerBackend};

/// Default directory for config and swap secrets
const DATA_DIR: &str = ".shadowswap";
const SWAPS_DIR: &str = "swaps";

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR))
        .context("Could not find home directory")
}

/// Directory holding one encrypted file per swap
pub fn swaps_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join(SWAPS_DIR))
}

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => ClientConfig::default_path().context("Could not locate config file"),
    }
}

/// Load the client config; `simulate` forces the in-memory relayer
pub fn load_config(explicit: Option<&Path>, simulate: bool) -> Result<ClientConfig> {
    let path = config_path(explicit)?;
    let mut config = ClientConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if simulate {
        config.relayer_backend = RelayerBackend::Simulated;
    }
    Ok(config)
}

/// Shorten a long hex value for display: 0x1234...abcd
pub fn short_hex(value: &str) -> String {
    if value.len() <= 14 {
        return value.to_string();
    }
    format!("{}...{}", &value[..6], &value[value.len() - 4..])
}
