//! One-shot swap status

use anyhow::{Context, Result};
use shadow_swap::relayer::RelayerClient;

use crate::output;

pub async fn run<L: RelayerClient>(relayer: &L, swap_id: &str) -> Result<()> {
    let report = relayer
        .get_swap_status(swap_id)
        .await
        .with_context(|| format!("Failed to get status of {}", swap_id))?;

    output::header("Swap Status");
    output::field("Swap", &report.swap_id);
    output::field("Status", output::status(report.status));
    output::field("Starknet amount", &report.starknet_amount);
    output::field("Zcash amount", &report.zcash_amount);
    if let Some(nullifier) = &report.starknet_htlc_nullifier {
        output::field("HTLC nullifier", nullifier);
    }
    if let Some(txid) = &report.zcash_txid {
        output::field("Zcash txid", txid);
    }
    output::field("Created", &report.created_at);
    output::field("Updated", &report.updated_at);
    if !report.status.is_terminal() {
        println!();
        println!("  Use 'shadowswap watch {}' to follow it.", report.swap_id);
    }
    println!();
    Ok(())
}
