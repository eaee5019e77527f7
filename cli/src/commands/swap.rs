//! Execute a swap and store its secrets

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use shadow_swap::amount::{from_base_units, parse_units, U256};
use shadow_swap::chain::{JsonRpcClient, SimulatedLedger, WatchOnlyAccount};
use shadow_swap::config::{ClientConfig, RelayerBackend};
use shadow_swap::orchestrator::SwapSummary;
use shadow_swap::{
    BalanceCache, Felt, FundsState, LedgerAccount, LedgerReader, PoolId, Relayer, SwapDirection, SwapError, SwapOrchestrator,
    SwapRequest, SwapResult,
};

use tracing::warn;

use crate::commands::watch;
use crate::output;
use crate::secure_storage::{prompt_new_password, SwapSecretData, SwapVault};

/// Starting balance the simulator gives the user, in whole tokens
const SIMULATED_FUNDING: &str = "1000";

pub struct SwapOptions {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub user: String,
    pub pool: Option<PoolId>,
    pub watch: bool,
}

pub async fn run(config: &ClientConfig, vault: &SwapVault, opts: SwapOptions) -> Result<()> {
    let registry = config.token_registry();
    let from = registry
        .by_symbol(&opts.from)
        .ok_or_else(|| anyhow!("Unknown token {}", opts.from))?
        .clone();
    let to = registry
        .by_symbol(&opts.to)
        .ok_or_else(|| anyhow!("Unknown token {}", opts.to))?
        .clone();
    let direction = SwapDirection::for_tokens(&from, &to).map_err(|e| anyhow!(e))?;
    let user = Felt::from_hex(&opts.user).context("Invalid user address")?;

    if config.relayer_backend == RelayerBackend::Http && direction.has_ledger_deposit() {
        bail!(
            "{} swaps deposit on Starknet and need a signing account; only --simulate supports them",
            direction
        );
    }

    let request = SwapRequest {
        from_token: from.symbol.clone(),
        to_token: to.symbol.clone(),
        amount: opts.amount.clone(),
        user_address: user,
        direction,
        pool: opts.pool.unwrap_or(config.default_pool),
    };

    // Ask before anything moves so the secret always has somewhere to go
    let password = prompt_new_password("Vault password for the swap secret: ")?;

    let relayer = Arc::new(config.build_relayer().context("Failed to build relayer client")?);

    output::header("Executing Swap");
    output::field("Pair", format!("{} -> {}", from.symbol, to.symbol));
    output::field("Amount", format!("{} {}", opts.amount, from.symbol));
    output::field("Direction", direction);
    output::field("Pool", request.pool);
    output::field("Relayer", relayer.backend_name());
    println!();

    let outcome = match config.relayer_backend {
        RelayerBackend::Simulated => {
            let ledger = simulated_ledger(config, user, &from).await?;
            let account = ledger.account(user);
            execute(config, relayer.clone(), ledger, &account, &request).await
        }
        RelayerBackend::Http => {
            let reader = JsonRpcClient::new(config.rpc_url()).context("Failed to create RPC client")?;
            execute(config, relayer.clone(), reader, &WatchOnlyAccount::new(user), &request).await
        }
    };

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            output::swap_failure(config.network, &err);
            if err.recovery_parameters().is_some() {
                let from_amount = parse_units(&request.amount, from.decimals)?;
                if let Some(persisted) =
                    save_recovery(vault, &err, direction, &from.symbol, &to.symbol, from_amount, &password)
                {
                    report_persisted(&persisted);
                }
            }
            return Err(err.into());
        }
    };

    let persisted = persist_secrets(vault, SwapSecretData::from_result(&result), &password);
    print_result(config, &result);
    report_persisted(&persisted);
    println!();

    if opts.watch {
        watch::follow(relayer, result.swap_id.clone(), config.monitor_config()).await?;
    } else if config.relayer_backend == RelayerBackend::Simulated {
        println!(
            "{}",
            "Simulated swaps live only in this process; pass --watch to follow one to completion.".dimmed()
        );
    } else {
        println!("Follow it with: shadowswap watch {}", result.swap_id);
    }
    Ok(())
}

/// Where a swap's secrets ended up
#[derive(Debug)]
pub(crate) enum Persisted {
    Saved(PathBuf),
    /// The usual file was taken or unwritable, stored under another id
    SavedAs { swap_id: String, path: PathBuf },
    /// Nothing could be written; the material was printed once instead
    Revealed,
}

/// Store `data` in the vault without ever losing it.
///
/// Falls back to a second file name, then to printing the material.
pub(crate) fn persist_secrets(vault: &SwapVault, mut data: SwapSecretData, password: &str) -> Persisted {
    let first = match vault.save(&data, password) {
        Ok(path) => return Persisted::Saved(path),
        Err(e) => e,
    };
    warn!(swap_id = %data.swap_id, error = %first, "could not store swap secrets, trying another file");

    let original_id = std::mem::take(&mut data.swap_id);
    let commitment = data.commitment.trim_start_matches("0x");
    data.swap_id = format!(
        "recovered_{}_{}",
        &commitment[..commitment.len().min(16)],
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    );
    match vault.save(&data, password) {
        Ok(path) => Persisted::SavedAs {
            swap_id: std::mem::replace(&mut data.swap_id, original_id),
            path,
        },
        Err(second) => {
            warn!(error = %second, "could not store swap secrets anywhere");
            data.swap_id = original_id;
            reveal_secrets(&data, &first);
            Persisted::Revealed
        }
    }
}

fn reveal_secrets(data: &SwapSecretData, cause: &anyhow::Error) {
    println!();
    println!("{} {:#}", "Could not store the swap secrets:".red().bold(), cause);
    println!("  {}", "Copy these now. They are shown once and are needed to refund or claim.".red());
    output::field("Swap ID", &data.swap_id);
    output::field("Commitment", &data.commitment);
    output::field("Hash lock", &data.hash_lock);
    output::field("Secret", format!("0x{}", hex::encode(data.secret)));
    output::field("Blinding", format!("0x{}", hex::encode(data.blinding_factor)));
    if let Some(tx) = &data.deposit_tx_hash {
        output::field("Deposit tx", tx);
    }
}

fn report_persisted(persisted: &Persisted) {
    match persisted {
        Persisted::Saved(path) => println!("  Secrets saved to {}", path.display().to_string().green()),
        Persisted::SavedAs { swap_id, path } => println!(
            "  Secrets saved as {} to {}",
            swap_id.yellow(),
            path.display().to_string().green()
        ),
        Persisted::Revealed => println!("  {}", "Secrets were NOT saved; keep the values printed above.".red().bold()),
    }
}

/// Persist the parameters of a deposit that may sit in the pool unregistered.
///
/// Returns `None` when the failure moved no funds.
pub(crate) fn save_recovery(
    vault: &SwapVault,
    err: &SwapError,
    direction: SwapDirection,
    from_symbol: &str,
    to_symbol: &str,
    from_amount: U256,
    password: &str,
) -> Option<Persisted> {
    let params = err.recovery_parameters()?;
    let deposit_tx = match err.funds_state() {
        FundsState::NotMoved => return None,
        FundsState::Committed { tx_hash } => Some(tx_hash),
        FundsState::Unknown { tx_hash } => tx_hash,
    };
    let data = SwapSecretData::from_unregistered(
        params,
        direction.as_str(),
        from_symbol,
        to_symbol,
        &from_amount.to_string(),
        deposit_tx.map(|tx| tx.to_hex()).as_deref(),
    );
    Some(persist_secrets(vault, data, password))
}

pub(crate) async fn execute<R, A>(
    config: &ClientConfig,
    relayer: Arc<Relayer>,
    reader: R,
    account: &A,
    request: &SwapRequest,
) -> Result<SwapResult, SwapError>
where
    R: LedgerReader + Clone,
    A: LedgerAccount,
{
    let orchestrator = SwapOrchestrator::new(
        reader,
        relayer,
        config.token_registry().clone(),
        config.pool_addresses(),
        config.retry_policy(),
        config.finality_policy(),
        Arc::new(BalanceCache::new()),
    );
    orchestrator.execute_swap(request, account).await
}

/// In-memory ledger with both pools deployed and the user funded
pub(crate) async fn simulated_ledger(config: &ClientConfig, user: Felt, from: &shadow_swap::Token) -> Result<SimulatedLedger> {
    let ledger = SimulatedLedger::new();
    let supported: Vec<Felt> = config
        .token_registry()
        .ledger_tokens()
        .iter()
        .filter_map(|t| t.address)
        .collect();
    let pools = config.pool_addresses();
    for pool in [PoolId::Fast, PoolId::Standard] {
        ledger
            .deploy_pool(pools.address(pool), &supported)
            .await
            .context("Failed to deploy simulated pool")?;
    }
    if let Some(token) = from.address {
        ledger
            .set_balance(token, user, parse_units(SIMULATED_FUNDING, from.decimals)?)
            .await;
    }
    Ok(ledger)
}

fn print_result(config: &ClientConfig, result: &SwapResult) {
    let summary = SwapSummary::from(result);
    output::header("Swap Registered");
    output::field("Swap ID", &summary.swap_id);
    output::field("Commitment", summary.commitment);
    output::field("Hash lock", &summary.hash_lock);
    output::field("Starknet leg", summary.starknet_amount);
    output::field("Zcash leg", summary.zcash_amount);
    if let Some(tx) = result.approval_tx_hash {
        output::tx(config.network, "Approval tx", &tx.to_hex());
    }
    if let Some(tx) = summary.deposit_tx_hash {
        output::tx(config.network, "Deposit tx", &tx.to_hex());
    }
    if let Some(step) = funding_step(config, result) {
        println!();
        println!("  {}", "Next step:".yellow().bold());
        println!("  {}", step);
        println!("  The Starknet leg is released once the relayer sees that HTLC.");
    }
    println!();
}

/// What the user must do on Zcash for a private-source swap to progress
pub(crate) fn funding_step(config: &ClientConfig, result: &SwapResult) -> Option<String> {
    if result.direction != SwapDirection::PrivateToLedger {
        return None;
    }
    let decimals = config.token_registry().by_symbol(&result.from_token).map_or(8, |t| t.decimals);
    let amount = from_base_units(&result.zcash_amount.to_string(), decimals)
        .unwrap_or_else(|_| result.zcash_amount.to_string());
    Some(format!(
        "Fund the relayer's Zcash HTLC with {} {} locked to hash lock {}.",
        amount, result.from_token, result.hash_lock
    ))
}
