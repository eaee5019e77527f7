//! Shadow Swap CLI - private cross-chain swaps between Starknet and Zcash

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shadow_swap::PoolId;

mod commands;
mod config;
mod output;
mod secure_storage;


#[cfg(test)]
mod test_vectors;

#[cfg(test)]
mod fuzz_tests;


use commands::*;
use secure_storage::SwapVault;

#[derive(Parser)]
#[command(name = "shadowswap")]
#[command(author = "Shadow Swap Team")]
#[command(version = "0.1.0")]
#[command(about = "Private cross-chain swaps between Starknet and Zcash")]
#[command(long_about = r#"
Shadow Swap moves value between Starknet and Zcash through hash-locked
swaps. Your funds are committed to a privacy pool on Starknet and a
relayer settles the Zcash side against the same hash lock.

The swap secret is stored encrypted in ~/.shadowswap/swaps. Losing it
before the swap settles forfeits the funds.

Quick Start:
  1. shadowswap quote STRK ZEC 10       Check the rate
  2. shadowswap swap STRK ZEC 10 -u ... Execute a swap
  3. shadowswap watch <swap-id>          Follow it to completion
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.shadowswap/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory ledger and relayer
    #[arg(long, global = true)]
    simulate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a price quote from the relayer
    Quote {
        from: String,
        to: String,
        /// Amount of `from` to convert
        amount: Option<String>,
    },

    /// Generate swap parameters without submitting anything
    Params {
        amount: String,

        #[arg(short, long, default_value = "18")]
        decimals: u32,
    },

    /// Check a secret against a hash lock
    Verify { secret: String, hash_lock: String },

    /// Execute a swap
    Swap {
        from: String,
        to: String,
        amount: String,

        /// Your Starknet address
        #[arg(short, long)]
        user: String,

        /// Privacy pool (fast or standard)
        #[arg(short, long)]
        pool: Option<PoolId>,

        /// Follow the swap until it settles
        #[arg(short, long)]
        watch: bool,
    },

    /// Show a swap's current status
    Status { swap_id: String },

    /// Follow a swap until it settles
    Watch { swap_id: String },

    /// Show privacy pool statistics
    Pool {
        #[arg(default_value = "fast")]
        pool: PoolId,
    },

    /// Check relayer health
    Health,

    /// Show relayer statistics
    Stats,

    /// Show configuration
    Info,

    /// Inspect stored swap secrets
    Secrets {
        #[command(subcommand)]
        command: SecretsCommand,
    },
}

#[derive(Subcommand)]
enum SecretsCommand {
    /// List stored swaps
    List,
    /// Decrypt and show one swap's secrets
    Show { swap_id: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shadowswap=info,shadow_swap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = config::config_path(cli.config.as_deref())?;
    let cfg = config::load_config(Some(&config_path), cli.simulate)?;
    let vault = SwapVault::new(config::swaps_dir()?);

    match cli.command {
        Commands::Quote { from, to, amount } => {
            let relayer = cfg.build_relayer()?;
            quote::run(&relayer, cfg.token_registry(), &from, &to, amount.as_deref()).await?;
        }
        Commands::Params { amount, decimals } => {
            params::run(&amount, decimals)?;
        }
        Commands::Verify { secret, hash_lock } => {
            verify::run(&secret, &hash_lock)?;
        }
        Commands::Swap { from, to, amount, user, pool, watch } => {
            swap::run(
                &cfg,
                &vault,
                swap::SwapOptions {
                    from,
                    to,
                    amount,
                    user,
                    pool,
                    watch,
                },
            )
            .await?;
        }
        Commands::Status { swap_id } => {
            let relayer = cfg.build_relayer()?;
            status::run(&relayer, &swap_id).await?;
        }
        Commands::Watch { swap_id } => {
            let relayer = Arc::new(cfg.build_relayer()?);
            watch::run(relayer, swap_id, cfg.monitor_config()).await?;
        }
        Commands::Pool { pool } => {
            pool::run(&cfg, pool).await?;
        }
        Commands::Health => {
            let relayer = cfg.build_relayer()?;
            health::run(&relayer, &cfg.relayer_url).await?;
        }
        Commands::Stats => {
            let relayer = cfg.build_relayer()?;
            stats::run(&relayer).await?;
        }
        Commands::Info => {
            info::run(&cfg, &config_path, &vault)?;
        }
        Commands::Secrets { command } => match command {
            SecretsCommand::List => secrets::list(&vault)?,
            SecretsCommand::Show { swap_id } => secrets::show(&vault, &swap_id)?,
        },
    }

    Ok(())
}
