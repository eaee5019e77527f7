//! Relayer swap counters

use anyhow::{Context, Result};
use colored::Colorize;
use shadow_swap::relayer::RelayerClient;

use crate::output;

pub async fn run<L: RelayerClient>(relayer: &L) -> Result<()> {
    let stats = relayer.get_stats().await.context("Failed to get relayer stats")?;

    output::header("Relayer Statistics");
    output::field("Total", stats.total_swaps);
    output::field("Successful", stats.successful_swaps.to_string().green());
    output::field("Pending", stats.pending_swaps.to_string().yellow());
    output::field("Refunded", stats.refunded_swaps.to_string().blue());
    output::field("Failed", stats.failed_swaps.to_string().red());
    if stats.critical_swaps > 0 {
        output::field("Critical", stats.critical_swaps.to_string().red().bold());
    }
    println!();
    Ok(())
}
