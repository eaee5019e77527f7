//! Generate swap parameters offline

use anyhow::{Context, Result};
use colored::Colorize;
use shadow_swap::amount::parse_units;
use shadow_swap::generate_swap_parameters;

use crate::output;

pub fn run(amount: &str, decimals: u32) -> Result<()> {
    let base = parse_units(amount, decimals).context("Invalid amount")?;
    let params = generate_swap_parameters(&base.to_string()).context("Failed to generate swap parameters")?;

    output::header("Swap Parameters");
    output::field("Amount", format!("{} ({} base units)", amount, base));
    output::field("Commitment", params.commitment);
    output::field("Hash lock", &params.hash_lock);
    println!();
    println!("{}", "SECRET MATERIAL - store it safely, never share it:".red().bold());
    output::field("Secret", params.secret.to_hex());
    output::field("Blinding factor", params.blinding_factor.to_hex());
    println!();
    Ok(())
}
