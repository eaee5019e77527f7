//! Swap orchestration
//!
//! Runs one swap attempt as a strict sequence:
//! validate -> base units -> counter-leg quote -> parameters ->
//! reconcile -> deposit (to finality) -> relayer registration.
//!
//! Nothing is retried past a failed step. Once a deposit is final it cannot
//! be undone, so a later failure is reported as [`SwapError::RegistrationFailed`]
//! carrying everything needed for the refund path.

use std::sync::Arc;

use rand::rngs::OsRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::amount::{parse_units, U256};
use crate::chain::{FinalityPolicy, LedgerAccount, LedgerReader, RetryPolicy, TxHash};
use crate::crypto::{generate_swap_parameters_with, CommitmentScheme, Secret, StarknetPoseidon, SwapParameters};
use crate::error::{SwapError, SwapStage};
use crate::felt::Felt;
use crate::pool::PoolClient;
use crate::reconcile::{ApprovalOutcome, BalanceCache, Reconciler};
use crate::relayer::{InitiateSwapRequest, RelayerClient};
use crate::swap::{PoolAddresses, PoolId, SwapDirection, SwapIntent, Token, TokenRegistry};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub from_token: String,
    pub to_token: String,
    /// Human-readable decimal amount of `from_token`
    pub amount: String,
    pub user_address: Felt,
    pub direction: SwapDirection,
    pub pool: PoolId,
}

/// A registered swap.
///
/// The caller must persist `secret` (and `blinding_factor`) until the swap
/// settles. Losing the secret before redemption forfeits the funds.
#[derive(Debug, Clone)]
pub struct SwapResult {
    pub swap_id: String,
    pub direction: SwapDirection,
    pub from_token: String,
    pub to_token: String,
    pub commitment: Felt,
    pub secret: Secret,
    pub blinding_factor: Secret,
    pub hash_lock: String,
    pub deposit_tx_hash: Option<TxHash>,
    pub approval_tx_hash: Option<TxHash>,
    pub from_amount: U256,
    pub starknet_amount: U256,
    pub zcash_amount: U256,
}

impl SwapResult {
    /// Client-side intent to track through the status monitor
    pub fn intent(&self) -> SwapIntent {
        SwapIntent::new(
            self.swap_id.clone(),
            self.direction,
            self.from_token.clone(),
            self.to_token.clone(),
            self.from_amount,
            self.commitment,
            self.hash_lock.clone(),
        )
    }
}

/// Public summary of a swap, safe to print or log
#[derive(Debug, Clone, Serialize)]
pub struct SwapSummary {
    pub swap_id: String,
    pub direction: SwapDirection,
    pub commitment: Felt,
    pub hash_lock: String,
    pub deposit_tx_hash: Option<TxHash>,
    pub starknet_amount: U256,
    pub zcash_amount: U256,
}

impl From<&SwapResult> for SwapSummary {
    fn from(r: &SwapResult) -> Self {
        Self {
            swap_id: r.swap_id.clone(),
            direction: r.direction,
            commitment: r.commitment,
            hash_lock: r.hash_lock.clone(),
            deposit_tx_hash: r.deposit_tx_hash,
            starknet_amount: r.starknet_amount,
            zcash_amount: r.zcash_amount,
        }
    }
}

pub struct SwapOrchestrator<R, L, S = StarknetPoseidon> {
    pool: PoolClient<R>,
    reconciler: Reconciler<R>,
    relayer: L,
    scheme: S,
    registry: TokenRegistry,
}

impl<R, L> SwapOrchestrator<R, L, StarknetPoseidon>
where
    R: LedgerReader + Clone,
    L: RelayerClient,
{
    pub fn new(
        reader: R,
        relayer: L,
        registry: TokenRegistry,
        pools: PoolAddresses,
        retry: RetryPolicy,
        finality: FinalityPolicy,
        cache: Arc<BalanceCache>,
    ) -> Self {
        Self {
            pool: PoolClient::new(reader.clone(), pools, retry, finality),
            reconciler: Reconciler::new(reader, retry, finality, cache),
            relayer,
            scheme: StarknetPoseidon,
            registry,
        }
    }
}

impl<R, L, S> SwapOrchestrator<R, L, S>
where
    R: LedgerReader,
    L: RelayerClient,
    S: CommitmentScheme,
{
    /// Swap in a different commitment hash
    pub fn with_scheme<S2: CommitmentScheme>(self, scheme: S2) -> SwapOrchestrator<R, L, S2> {
        SwapOrchestrator {
            pool: self.pool,
            reconciler: self.reconciler,
            relayer: self.relayer,
            scheme,
            registry: self.registry,
        }
    }

    pub fn pool_client(&self) -> &PoolClient<R> {
        &self.pool
    }

    pub fn relayer(&self) -> &L {
        &self.relayer
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<BalanceCache> {
        self.reconciler.cache()
    }

    /// Resolve both tokens and check the direction against their chains
    pub fn validate(&self, request: &SwapRequest) -> Result<(Token, Token), SwapError> {
        let from = self
            .registry
            .by_symbol(&request.from_token)
            .ok_or_else(|| SwapError::UnknownToken(request.from_token.clone()))?;
        let to = self
            .registry
            .by_symbol(&request.to_token)
            .ok_or_else(|| SwapError::UnknownToken(request.to_token.clone()))?;

        if from.symbol == to.symbol {
            return Err(SwapError::InvalidRequest(format!("cannot swap {} for itself", from.symbol)));
        }

        let expected = SwapDirection::for_tokens(from, to).map_err(SwapError::InvalidRequest)?;
        if expected != request.direction {
            return Err(SwapError::InvalidRequest(format!(
                "{} -> {} is {}, not {}",
                from.symbol, to.symbol, expected, request.direction
            )));
        }
        if request.direction.has_ledger_deposit() && from.address.is_none() {
            return Err(SwapError::InvalidRequest(format!(
                "{} has no contract on the ledger chain",
                from.symbol
            )));
        }
        Ok((from.clone(), to.clone()))
    }

    /// Base-unit amount of the counter leg, from the relayer price feed
    async fn counter_amount(&self, from: &Token, to: &Token, amount: &str) -> Result<U256, SwapError> {
        let quote = self
            .relayer
            .get_price(&from.symbol, &to.symbol, Some(amount))
            .await
            .map_err(SwapError::Quote)?;
        quote.converted_base_units(to.decimals).map_err(SwapError::Quote)
    }

    pub async fn execute_swap<A: LedgerAccount>(
        &self,
        request: &SwapRequest,
        account: &A,
    ) -> Result<SwapResult, SwapError> {
        // 1. validate
        let (from, to) = self.validate(request)?;
        self.relayer.ensure_can_initiate().map_err(SwapError::Relayer)?;
        if request.direction.has_ledger_deposit() && account.address() != request.user_address {
            return Err(SwapError::InvalidRequest(format!(
                "signing account {} does not match user address {}",
                account.address(),
                request.user_address
            )));
        }

        // 2. base units
        let amount = parse_units(&request.amount, from.decimals)?;
        if amount.is_zero() {
            return Err(SwapError::ZeroAmount);
        }
        info!(
            direction = %request.direction,
            from = %from.symbol,
            to = %to.symbol,
            %amount,
            "starting swap"
        );

        // counter leg
        let (starknet_amount, zcash_amount) = match request.direction {
            SwapDirection::LedgerToPrivate => {
                (amount, self.counter_amount(&from, &to, &request.amount).await?)
            }
            SwapDirection::PrivateToLedger => {
                let ledger_leg = match self.counter_amount(&from, &to, &request.amount).await {
                    Ok(counter) => counter,
                    Err(e) => {
                        warn!(error = %e, "no quote for ledger leg, registering without it");
                        U256::ZERO
                    }
                };
                (ledger_leg, amount)
            }
            SwapDirection::LedgerInternal => (amount, U256::ZERO),
        };

        // 3. parameters
        let params = generate_swap_parameters_with(&amount, &self.scheme, &mut OsRng)?;
        info!(commitment = %params.commitment, hash_lock = params.hash_lock_prefix(), "swap parameters generated");

        // 4. reconcile + deposit
        let mut approval_tx_hash = None;
        let mut deposit_tx_hash = None;
        if request.direction.has_ledger_deposit() {
            let token = from.address.ok_or_else(|| {
                SwapError::InvalidRequest(format!("{} has no contract on the ledger chain", from.symbol))
            })?;
            let pool_address = self.pool.pool_address(request.pool);

            let outcome = self
                .reconciler
                .ensure_spendable(account, token, pool_address, amount)
                .await?;
            if let ApprovalOutcome::Approved { tx_hash } = outcome {
                approval_tx_hash = Some(tx_hash);
            }

            let tx_hash = match self
                .pool
                .deposit(account, request.pool, token, params.commitment, amount)
                .await
            {
                Ok(tx_hash) => tx_hash,
                Err(e) if e.submitted_tx().is_some() || e.is_transient() => {
                    let deposit_tx = e.submitted_tx();
                    warn!(?deposit_tx, error = %e, "deposit outcome unknown");
                    self.cache().invalidate(account.address(), token).await;
                    return Err(SwapError::DepositUnconfirmed {
                        deposit_tx,
                        params: Box::new(params),
                        source: e,
                    });
                }
                Err(e) => return Err(SwapError::Deposit(e)),
            };
            self.cache().invalidate(account.address(), token).await;
            deposit_tx_hash = Some(tx_hash);
        }

        // 5. register
        let registration = InitiateSwapRequest {
            user_address: request.user_address.to_hex(),
            swap_direction: request.direction,
            commitment: params.commitment.to_hex(),
            hash_lock: params.hash_lock.clone(),
            starknet_amount: starknet_amount.to_string(),
            zcash_amount: zcash_amount.to_string(),
        };
        let swap_id = match self.relayer.initiate_swap(&registration).await {
            Ok(id) => id,
            Err(source) => {
                return Err(match deposit_tx_hash {
                    Some(deposit_tx) => {
                        warn!(%deposit_tx, error = %source, "deposit final but registration failed");
                        SwapError::RegistrationFailed {
                            deposit_tx,
                            params: Box::new(params),
                            source,
                        }
                    }
                    None => SwapError::Relayer(source),
                })
            }
        };
        info!(%swap_id, stage = ?SwapStage::Registered, "swap registered");

        // 6. hand the parameters back
        let SwapParameters {
            secret,
            blinding_factor,
            commitment,
            hash_lock,
        } = params;
        Ok(SwapResult {
            swap_id,
            direction: request.direction,
            from_token: from.symbol,
            to_token: to.symbol,
            commitment,
            secret,
            blinding_factor,
            hash_lock,
            deposit_tx_hash,
            approval_tx_hash,
            from_amount: amount,
            starknet_amount,
            zcash_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{SimulatedLedger, WatchOnlyAccount};
    use crate::error::FundsState;
    use crate::relayer::SimulatedRelayer;

    fn orchestrator(ledger: &SimulatedLedger, relayer: &SimulatedRelayer) -> SwapOrchestrator<SimulatedLedger, SimulatedRelayer> {
        SwapOrchestrator::new(
            ledger.clone(),
            relayer.clone(),
            TokenRegistry::default(),
            PoolAddresses::default(),
            RetryPolicy::no_retry(),
            FinalityPolicy::default(),
            Arc::new(BalanceCache::new()),
        )
    }

    fn request(from: &str, to: &str, amount: &str, direction: SwapDirection) -> SwapRequest {
        SwapRequest {
            from_token: from.into(),
            to_token: to.into(),
            amount: amount.into(),
            user_address: Felt::from_u128(0xabcdef0123),
            direction,
            pool: PoolId::Fast,
        }
    }

    #[tokio::test]
    async fn test_rejects_private_to_private() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let err = o
            .execute_swap(
                &request("ZEC", "ZEC", "1", SwapDirection::PrivateToLedger),
                &WatchOnlyAccount::new(Felt::ONE),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidRequest(_)));
        assert_eq!(err.funds_state(), FundsState::NotMoved);
    }

    #[tokio::test]
    async fn test_rejects_direction_mismatch() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let err = o.validate(&request("STRK", "ZEC", "1", SwapDirection::PrivateToLedger)).unwrap_err();
        assert!(matches!(err, SwapError::InvalidRequest(_)));
        let err = o.validate(&request("STRK", "DOGE", "1", SwapDirection::LedgerToPrivate)).unwrap_err();
        assert!(matches!(err, SwapError::UnknownToken(_)));
    }

    #[tokio::test]
    async fn test_rejects_zero_after_conversion() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let req = request("USDC", "STRK", "0.0000001", SwapDirection::LedgerInternal);
        let err = o
            .execute_swap(&req, &ledger.account(req.user_address))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::ZeroAmount));
        assert!(relayer.received_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_amount() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let req = request("STRK", "ZEC", "ten", SwapDirection::LedgerToPrivate);
        let err = o.execute_swap(&req, &ledger.account(req.user_address)).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidAmount(_)));
        assert_eq!(err.completed_stage(), SwapStage::NotStarted);
    }

    #[tokio::test]
    async fn test_private_source_skips_deposit() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let req = request("ZEC", "STRK", "1", SwapDirection::PrivateToLedger);

        let result = o.execute_swap(&req, &WatchOnlyAccount::new(req.user_address)).await.unwrap();
        assert!(result.deposit_tx_hash.is_none());
        assert_eq!(result.zcash_amount, U256::from(100_000_000u128));
        assert!(ledger.executed_calls().await.is_empty());

        let sent = relayer.received_requests().await;
        assert_eq!(sent[0].swap_direction, SwapDirection::PrivateToLedger);
        assert_eq!(sent[0].zcash_amount, "100000000");
        assert_eq!(sent[0].starknet_amount, "41670000000000000000");
    }

    #[tokio::test]
    async fn test_secret_never_sent_to_relayer() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let req = request("ZEC", "STRK", "2", SwapDirection::PrivateToLedger);

        let result = o.execute_swap(&req, &WatchOnlyAccount::new(req.user_address)).await.unwrap();
        let body = serde_json::to_string(&relayer.received_requests().await[0]).unwrap();
        assert!(!body.contains(&result.secret.to_hex()[2..]));
        assert!(!body.contains(&result.blinding_factor.to_hex()[2..]));
        assert!(body.contains(&result.hash_lock));
    }

    #[tokio::test]
    async fn test_account_must_match_user() {
        let (ledger, relayer) = (SimulatedLedger::new(), SimulatedRelayer::new());
        let o = orchestrator(&ledger, &relayer);
        let req = request("STRK", "ZEC", "1", SwapDirection::LedgerToPrivate);
        let err = o
            .execute_swap(&req, &ledger.account(Felt::from_u128(0x999)))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidRequest(_)));
    }
}
