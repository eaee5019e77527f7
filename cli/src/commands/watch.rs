//! Follow a swap until it settles

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use shadow_swap::monitor::{spawn_monitor, MonitorConfig};
use shadow_swap::relayer::RelayerClient;
use shadow_swap::SwapStatus;

use crate::output;

pub async fn run<L: RelayerClient + 'static>(relayer: Arc<L>, swap_id: String, config: MonitorConfig) -> Result<()> {
    follow(relayer, swap_id, config).await.map(|_| ())
}

/// Stream status updates until a terminal status or Ctrl-C.
///
/// Returns `None` when interrupted; the swap itself is unaffected.
pub async fn follow<L: RelayerClient + 'static>(
    relayer: Arc<L>,
    swap_id: String,
    config: MonitorConfig,
) -> Result<Option<SwapStatus>> {
    println!(
        "{} {} (every {:?}, Ctrl-C to stop watching)",
        "Watching".cyan(),
        swap_id,
        config.poll_interval
    );

    let mut handle = spawn_monitor(relayer, swap_id, config);
    loop {
        tokio::select! {
            update = handle.next_update() => match update {
                Some(report) => output::report(&report),
                None => break,
            },
            interrupted = tokio::signal::ctrl_c() => {
                interrupted.context("Failed to listen for Ctrl-C")?;
                handle.cancel();
                println!("{}", "Stopped watching. The swap continues without you.".yellow());
                return Ok(None);
            }
        }
    }

    let end = handle.finished().await;
    match end {
        Some(SwapStatus::Redeemed) => println!("{}", "Swap redeemed.".green().bold()),
        Some(SwapStatus::Refunded) => println!("{}", "Swap refunded; funds returned through the timelock path.".blue()),
        Some(SwapStatus::Failed) => println!(
            "{}",
            "Swap failed on the relayer side. Funds are recoverable through the refund path.".red()
        ),
        _ => {}
    }
    Ok(end)
}
