//! Pool statistics from the ledger chain

use anyhow::{Context, Result};
use shadow_swap::amount::format_token_amount;
use shadow_swap::chain::JsonRpcClient;
use shadow_swap::config::ClientConfig;
use shadow_swap::pool::PoolClient;
use shadow_swap::PoolId;

use crate::output;

pub async fn run(config: &ClientConfig, pool: PoolId) -> Result<()> {
    let reader = JsonRpcClient::new(config.rpc_url()).context("Failed to create RPC client")?;
    let client = PoolClient::new(
        reader,
        config.pool_addresses(),
        config.retry_policy(),
        config.finality_policy(),
    );

    let stats = client
        .get_pool_stats(pool, &config.token_registry().ledger_tokens())
        .await
        .with_context(|| format!("Failed to read {} pool via {}", pool, config.rpc_url()))?;

    output::header(&format!("{} Pool", pool.to_string().to_uppercase()));
    output::field("Address", stats.address);
    output::field("Merkle root", stats.current_root);
    output::field("Deposits", stats.next_leaf_index);
    println!();
    if stats.balances.is_empty() {
        println!("  No supported token balances.");
    }
    for balance in &stats.balances {
        let amount = format_token_amount(&balance.balance.to_string(), balance.decimals, 6)?;
        output::field(&balance.symbol, amount);
    }
    println!();
    Ok(())
}
