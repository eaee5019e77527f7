//! Check a revealed secret against a hash lock

use anyhow::{bail, Result};
use colored::Colorize;
use shadow_swap::verify_secret;

pub fn run(secret: &str, hash_lock: &str) -> Result<()> {
    if verify_secret(secret, hash_lock) {
        println!("{}", "Secret matches the hash lock.".green().bold());
        Ok(())
    } else {
        bail!("Secret does NOT match the hash lock")
    }
}
