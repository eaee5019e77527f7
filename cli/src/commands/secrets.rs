//! Inspect stored swap secrets

use anyhow::Result;
use colored::Colorize;

use crate::output;
use crate::secure_storage::{prompt_password, SwapVault};

pub fn list(vault: &SwapVault) -> Result<()> {
    let files = vault.list()?;
    output::header("Stored Swaps");
    if files.is_empty() {
        println!("  None in {}", vault.dir().display());
        println!();
        return Ok(());
    }

    for file in &files {
        let marker = if file.unregistered {
            " UNREGISTERED - refund required".red().bold().to_string()
        } else {
            String::new()
        };
        println!("  {}{}", file.swap_id.cyan(), marker);
        println!("    hash lock  {}", file.hash_lock);
        println!("    commitment {}", file.commitment);
        println!("    stored     {}", file.created_at.dimmed());
    }
    println!();
    Ok(())
}

pub fn show(vault: &SwapVault, swap_id: &str) -> Result<()> {
    let password = prompt_password("Vault password: ")?;
    let data = vault.load(swap_id, &password)?;

    output::header("Swap Secrets");
    output::field("Swap", &data.swap_id);
    output::field("Direction", &data.direction);
    output::field("Pair", format!("{} -> {}", data.from_token, data.to_token));
    output::field("Amount", format!("{} base units", data.amount));
    output::field("Commitment", &data.commitment);
    output::field("Hash lock", &data.hash_lock);
    if let Some(tx) = &data.deposit_tx_hash {
        output::field("Deposit tx", tx);
    }
    println!();
    println!("{}", "SECRET MATERIAL - never share it:".red().bold());
    output::field("Secret", format!("0x{}", hex::encode(data.secret)));
    output::field("Blinding factor", format!("0x{}", hex::encode(data.blinding_factor)));
    println!();
    Ok(())
}
