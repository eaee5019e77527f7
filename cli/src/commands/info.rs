//! Show configuration and stored swaps

use anyhow::Result;
use colored::Colorize;
use shadow_swap::config::{ClientConfig, RelayerBackend};

use crate::output;
use crate::secure_storage::SwapVault;

pub fn run(config: &ClientConfig, config_path: &std::path::Path, vault: &SwapVault) -> Result<()> {
    output::header("Shadow Swap Configuration");

    println!("{}:", "Network".cyan());
    println!("  {} (chain id {})", config.network, config.network.chain_id());
    println!("  RPC:      {}", config.rpc_url());
    println!("  Explorer: {}", config.network.explorer_url());
    println!();

    println!("{}:", "Relayer".cyan());
    match config.relayer_backend {
        RelayerBackend::Http => {
            println!("  {}", config.relayer_url);
            if config.hmac_secret.is_some() {
                println!("  Request signing: {}", "CONFIGURED".green());
            } else {
                println!("  Request signing: {}", "NOT CONFIGURED".red());
                println!("  Set SHADOWSWAP_HMAC_SECRET to register swaps");
            }
        }
        RelayerBackend::Simulated => println!("  {}", "in-memory simulator".yellow()),
    }
    println!();

    println!("{}:", "Pools".cyan());
    println!("  fast:     {}", config.pools.fast);
    println!("  standard: {}", config.pools.standard);
    println!("  default:  {}", config.default_pool);
    println!();

    println!("{}:", "Tokens".cyan());
    for token in config.token_registry().iter() {
        let address = token
            .address
            .map(|a| a.to_hex())
            .unwrap_or_else(|| "(native)".to_string());
        println!(
            "  {:<6} {:<8} {:>2} decimals  {}",
            token.symbol,
            token.chain,
            token.decimals,
            address.dimmed()
        );
    }
    println!();

    println!("{}:", "File Locations".cyan());
    println!("  Config: {}", config_path.display());
    println!("  Swaps:  {} ({} stored)", vault.dir().display(), vault.list()?.len());
    println!();
    Ok(())
}
