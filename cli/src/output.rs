//! Terminal formatting shared by the commands

use colored::{ColoredString, Colorize};
use shadow_swap::config::Network;
use shadow_swap::relayer::SwapStatusReport;
use shadow_swap::{FundsState, SwapError, SwapStatus};

pub fn header(title: &str) {
    println!();
    println!("{}", title.yellow().bold());
    println!();
}

pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<16} {}", format!("{}:", label).cyan(), value);
}

pub fn status(status: SwapStatus) -> ColoredString {
    match status {
        SwapStatus::Initiated => status.as_str().white(),
        SwapStatus::Locked => status.as_str().yellow(),
        SwapStatus::Redeemed => status.as_str().green().bold(),
        SwapStatus::Refunded => status.as_str().blue(),
        SwapStatus::Failed => status.as_str().red().bold(),
    }
}

pub fn report(report: &SwapStatusReport) {
    println!(
        "  [{}] {} {}",
        chrono::Local::now().format("%H:%M:%S"),
        report.swap_id.dimmed(),
        status(report.status)
    );
}

pub fn tx(network: Network, label: &str, tx_hash: &str) {
    field(label, tx_hash);
    println!("  {:<16} {}", "", network.tx_url(tx_hash).dimmed());
}

/// Spell out where the user's funds are after a failed swap
pub fn swap_failure(network: Network, err: &SwapError) {
    println!();
    println!("{} {}", "Swap failed:".red().bold(), err);
    println!("  {:<16} {:?}", "Last step:".cyan(), err.completed_stage());
    match err.funds_state() {
        FundsState::NotMoved => {
            println!("  {}", "No funds were moved. It is safe to retry.".green());
        }
        FundsState::Committed { tx_hash } => {
            println!("  {}", "Funds ARE deposited in the pool.".red().bold());
            tx(network, "Deposit tx", &tx_hash.to_hex());
            println!("  {}", "Do NOT resubmit this swap.".red());
            println!("  Keep the stored swap secret; it is required for the refund path.");
        }
        FundsState::Unknown { tx_hash } => {
            println!("  {}", "The deposit may or may not have landed.".yellow().bold());
            if let Some(tx_hash) = tx_hash {
                tx(network, "Deposit tx", &tx_hash.to_hex());
            }
            println!("  Check the transaction before retrying.");
            if err.recovery_parameters().is_some() {
                println!("  Keep the stored swap secret; if the deposit landed it is required for the refund path.");
            }
        }
    }
}
