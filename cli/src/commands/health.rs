//! Relayer liveness

use anyhow::{Context, Result};
use colored::Colorize;
use shadow_swap::relayer::RelayerClient;

pub async fn run<L: RelayerClient>(relayer: &L, relayer_url: &str) -> Result<()> {
    let health = relayer
        .health()
        .await
        .with_context(|| format!("Relayer at {} is unreachable", relayer_url))?;

    let status = if health.status.eq_ignore_ascii_case("healthy") || health.status.eq_ignore_ascii_case("ok") {
        health.status.green().bold()
    } else {
        health.status.yellow().bold()
    };
    println!("Relayer {}: {} ({})", relayer_url, status, health.timestamp);
    Ok(())
}
