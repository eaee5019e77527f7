//! Balance & allowance reconciliation
//!
//! Runs immediately before every deposit. Cached balances are never trusted
//! here; every decision is made on a live read, and both balance and
//! allowance are read again after any approval wait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::amount::U256;
use crate::chain::{FinalityPolicy, LedgerAccount, LedgerReader, RetryPolicy, TxHash};
use crate::error::{ChainError, ReconcileError};
use crate::felt::Felt;
use crate::pool::TokenClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Allowance already covered the amount; nothing was submitted
    AlreadySufficient,
    /// One approval transaction was submitted and is final
    Approved { tx_hash: TxHash },
}

impl ApprovalOutcome {
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            ApprovalOutcome::AlreadySufficient => None,
            ApprovalOutcome::Approved { tx_hash } => Some(*tx_hash),
        }
    }
}

// ============================================================================
// Balance Cache
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CachedBalance {
    pub amount: U256,
    pub fetched_at: Instant,
}

/// Display-side balance cache shared across swaps.
///
/// Eventually consistent: entries are hints for the UI, never a substitute
/// for the live reads [`Reconciler::ensure_spendable`] performs.
#[derive(Debug, Default)]
pub struct BalanceCache {
    entries: RwLock<HashMap<(Felt, Felt), CachedBalance>>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, account: Felt, token: Felt) -> Option<CachedBalance> {
        self.entries.read().await.get(&(account, token)).copied()
    }

    pub async fn record(&self, account: Felt, token: Felt, amount: U256) {
        self.entries.write().await.insert(
            (account, token),
            CachedBalance {
                amount,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Re-read a balance from chain and store it
    pub async fn refresh<R: LedgerReader>(
        &self,
        tokens: &TokenClient<R>,
        account: Felt,
        token: Felt,
    ) -> Result<U256, ChainError> {
        let amount = tokens.balance_of(token, account).await?;
        self.record(account, token, amount).await;
        Ok(amount)
    }

    pub async fn invalidate(&self, account: Felt, token: Felt) {
        self.entries.write().await.remove(&(account, token));
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }
}

// ============================================================================
// Reconciler
// ============================================================================

#[derive(Debug, Clone)]
pub struct Reconciler<R> {
    tokens: TokenClient<R>,
    cache: Arc<BalanceCache>,
}

impl<R: LedgerReader> Reconciler<R> {
    pub fn new(reader: R, retry: RetryPolicy, finality: FinalityPolicy, cache: Arc<BalanceCache>) -> Self {
        Self {
            tokens: TokenClient::new(reader, retry, finality),
            cache,
        }
    }

    pub fn tokens(&self) -> &TokenClient<R> {
        &self.tokens
    }

    pub fn cache(&self) -> &Arc<BalanceCache> {
        &self.cache
    }

    /// Make sure `pool` may pull `amount` of `token` from `account`.
    ///
    /// 1. live balance must cover `amount`
    /// 2. if the allowance is short, approve exactly `amount` and wait for it
    /// 3. re-read balance and allowance before returning
    pub async fn ensure_spendable<A: LedgerAccount>(
        &self,
        account: &A,
        token: Felt,
        pool: Felt,
        amount: U256,
    ) -> Result<ApprovalOutcome, ReconcileError> {
        let owner = account.address();

        let balance = self.tokens.balance_of(token, owner).await?;
        self.cache.record(owner, token, balance).await;
        if balance < amount {
            return Err(ReconcileError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }

        let allowance = self.tokens.allowance(token, owner, pool).await?;
        debug!(%token, %allowance, %amount, "allowance checked");

        let outcome = if allowance < amount {
            let tx_hash = self.tokens.approve(account, token, pool, amount).await?;
            info!(%tx_hash, %token, %amount, "approval final");

            let allowance = self.tokens.allowance(token, owner, pool).await?;
            if allowance < amount {
                warn!(%tx_hash, %allowance, %amount, "approval did not raise allowance");
                return Err(ReconcileError::ApprovalFailed {
                    allowance,
                    need: amount,
                    tx_hash: Some(tx_hash),
                });
            }
            ApprovalOutcome::Approved { tx_hash }
        } else {
            ApprovalOutcome::AlreadySufficient
        };

        // State may have moved while we waited; check both again
        let balance = self.tokens.balance_of(token, owner).await?;
        self.cache.record(owner, token, balance).await;
        if balance < amount {
            return Err(ReconcileError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }
        let allowance = self.tokens.allowance(token, owner, pool).await?;
        if allowance < amount {
            return Err(ReconcileError::ApprovalFailed {
                allowance,
                need: amount,
                tx_hash: outcome.tx_hash(),
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedLedger;

    const TOKEN: u128 = 0x70;
    const POOL: u128 = 0x900;
    const USER: u128 = 0x1;

    async fn setup(balance: u128, allowance: u128) -> (SimulatedLedger, Reconciler<SimulatedLedger>) {
        let ledger = SimulatedLedger::new();
        let (token, pool, user) = (Felt::from_u128(TOKEN), Felt::from_u128(POOL), Felt::from_u128(USER));
        ledger.set_balance(token, user, U256::from(balance)).await;
        ledger.set_allowance(token, user, pool, U256::from(allowance)).await;
        let reconciler = Reconciler::new(
            ledger.clone(),
            RetryPolicy::no_retry(),
            FinalityPolicy::default(),
            Arc::new(BalanceCache::new()),
        );
        (ledger, reconciler)
    }

    async fn ensure(ledger: &SimulatedLedger, r: &Reconciler<SimulatedLedger>, amount: u128) -> Result<ApprovalOutcome, ReconcileError> {
        r.ensure_spendable(
            &ledger.account(Felt::from_u128(USER)),
            Felt::from_u128(TOKEN),
            Felt::from_u128(POOL),
            U256::from(amount),
        )
        .await
    }

    #[tokio::test]
    async fn test_sufficient_allowance_submits_nothing() {
        let (ledger, r) = setup(100, 100).await;
        assert_eq!(ensure(&ledger, &r, 80).await.unwrap(), ApprovalOutcome::AlreadySufficient);
        assert_eq!(ledger.count_calls("approve").await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_fatal() {
        let (ledger, r) = setup(50, 0).await;
        let err = ensure(&ledger, &r, 80).await.unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InsufficientBalance {
                have: U256::from(50u128),
                need: U256::from(80u128)
            }
        );
        assert_eq!(ledger.count_calls("approve").await, 0);
    }

    #[tokio::test]
    async fn test_zero_allowance_approves_once() {
        let (ledger, r) = setup(100, 0).await;
        let outcome = ensure(&ledger, &r, 80).await.unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Approved { .. }));
        assert_eq!(ledger.count_calls("approve").await, 1);
    }

    #[tokio::test]
    async fn test_capped_approval_fails() {
        let (ledger, r) = setup(100, 0).await;
        ledger.cap_approvals(U256::from(60u128)).await;

        let err = ensure(&ledger, &r, 80).await.unwrap_err();
        match err {
            ReconcileError::ApprovalFailed { allowance, need, tx_hash } => {
                assert_eq!(allowance, U256::from(60u128));
                assert_eq!(need, U256::from(80u128));
                assert!(tx_hash.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_balance_drained_during_approval_wait() {
        let (ledger, r) = setup(100, 0).await;
        ledger
            .set_balance_after_next_approval(Felt::from_u128(TOKEN), Felt::from_u128(USER), U256::from(10u128))
            .await;

        let err = ensure(&ledger, &r, 80).await.unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InsufficientBalance {
                have: U256::from(10u128),
                need: U256::from(80u128)
            }
        );
    }

    #[tokio::test]
    async fn test_cache_records_live_balance() {
        let (ledger, r) = setup(100, 100).await;
        ensure(&ledger, &r, 1).await.unwrap();
        let cached = r.cache().get(Felt::from_u128(USER), Felt::from_u128(TOKEN)).await.unwrap();
        assert_eq!(cached.amount, U256::from(100u128));

        r.cache().invalidate(Felt::from_u128(USER), Felt::from_u128(TOKEN)).await;
        assert!(r.cache().get(Felt::from_u128(USER), Felt::from_u128(TOKEN)).await.is_none());
    }
}
