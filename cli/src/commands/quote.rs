//! Price quote from the relayer

use anyhow::{Context, Result};
use colored::Colorize;
use shadow_swap::relayer::RelayerClient;
use shadow_swap::TokenRegistry;

use crate::output;

pub async fn run<L: RelayerClient>(
    relayer: &L,
    registry: &TokenRegistry,
    from: &str,
    to: &str,
    amount: Option<&str>,
) -> Result<()> {
    let quote = relayer
        .get_price(from, to, amount)
        .await
        .with_context(|| format!("Failed to get {}/{} price", from, to))?;

    output::header("Price Quote");
    output::field("Pair", format!("{}/{}", quote.from_symbol, quote.to_symbol));
    output::field("Rate", quote.rate);

    if let (Some(amount), Some(converted)) = (&quote.amount, &quote.converted_amount) {
        output::field("You send", format!("{} {}", amount, quote.from_symbol));
        output::field("You receive", format!("~{} {}", converted, quote.to_symbol).green());
        if let Some(token) = registry.by_symbol(to) {
            let base = quote
                .converted_base_units(token.decimals)
                .context("Relayer sent an unusable converted amount")?;
            output::field("Base units", base);
        }
    }
    output::field(
        "Quoted at",
        chrono::DateTime::from_timestamp(quote.timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| quote.timestamp.to_string()),
    );
    println!();
    Ok(())
}
