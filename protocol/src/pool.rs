//! Privacy pool and token contract clients
//!
//! Reads go through [`read_with_retry`]; state-changing calls are submitted
//! through the caller's account and awaited to finality. Reverts come back as
//! [`ChainError::Reverted`] with the contract's own reason.
//!
//! Pool ABI:
//! - `deposit(token, commitment, amount: u256)`
//! - `withdraw(token, nullifier, recipient, secret: Option<felt252>)`
//! - `get_balance(token) -> u256`
//! - `get_current_root() -> felt252`
//! - `get_next_leaf_index() -> u32`
//! - `is_token_supported(token) -> bool`

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::amount::U256;
use crate::chain::{read_with_retry, wait_for_finality, Call, FinalityPolicy, LedgerAccount, LedgerReader, RetryPolicy, TxHash};
use crate::error::ChainError;
use crate::felt::Felt;
use crate::swap::{PoolAddresses, PoolId, Token};

// ============================================================================
// Calldata
// ============================================================================

pub fn deposit_calldata(token: Felt, commitment: Felt, amount: U256) -> Vec<Felt> {
    let (low, high) = amount.to_felts();
    vec![token, commitment, low, high]
}

/// `Option<felt252>` is serialized as `[0]` for `None`, `[1, value]` for `Some`
pub fn withdraw_calldata(token: Felt, nullifier: Felt, recipient: Felt, secret: Option<Felt>) -> Vec<Felt> {
    let mut calldata = vec![token, nullifier, recipient];
    match secret {
        None => calldata.push(Felt::ZERO),
        Some(secret) => {
            calldata.push(Felt::ONE);
            calldata.push(secret);
        }
    }
    calldata
}

pub fn approve_calldata(spender: Felt, amount: U256) -> Vec<Felt> {
    let (low, high) = amount.to_felts();
    vec![spender, low, high]
}

fn decode_u256(words: &[Felt], what: &str) -> Result<U256, ChainError> {
    match words {
        [low, high, ..] => U256::from_felts(low, high)
            .ok_or_else(|| ChainError::MalformedResponse(format!("{what}: u256 limb exceeds 128 bits"))),
        _ => Err(ChainError::MalformedResponse(format!(
            "{what}: expected [low, high], got {} words",
            words.len()
        ))),
    }
}

fn decode_single(words: &[Felt], what: &str) -> Result<Felt, ChainError> {
    words
        .first()
        .copied()
        .ok_or_else(|| ChainError::MalformedResponse(format!("{what}: empty result")))
}

fn token_address(token: &Token) -> Result<Felt, ChainError> {
    token.address.ok_or_else(|| {
        ChainError::MalformedResponse(format!("{} has no ledger-chain contract", token.symbol))
    })
}

// ============================================================================
// Pool Client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub token: Felt,
    pub balance: U256,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub pool: PoolId,
    pub address: Felt,
    pub current_root: Felt,
    pub next_leaf_index: u32,
    pub balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone)]
pub struct PoolClient<R> {
    reader: R,
    pools: PoolAddresses,
    retry: RetryPolicy,
    finality: FinalityPolicy,
}

impl<R: LedgerReader> PoolClient<R> {
    pub fn new(reader: R, pools: PoolAddresses, retry: RetryPolicy, finality: FinalityPolicy) -> Self {
        Self {
            reader,
            pools,
            retry,
            finality,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn pool_address(&self, pool: PoolId) -> Felt {
        self.pools.address(pool)
    }

    async fn view(&self, what: &str, call: Call) -> Result<Vec<Felt>, ChainError> {
        read_with_retry(&self.retry, what, || self.reader.call(&call)).await
    }

    async fn submit<A: LedgerAccount>(&self, account: &A, call: Call) -> Result<TxHash, ChainError> {
        let entry_point = call.entry_point.clone();
        let tx_hash = account.execute(&[call]).await?;
        info!(%tx_hash, %entry_point, "submitted, waiting for finality");
        match wait_for_finality(&self.reader, &tx_hash, &self.finality).await {
            Ok(_) => Ok(tx_hash),
            Err(e) => {
                warn!(%tx_hash, %entry_point, error = %e, "transaction did not finalize");
                Err(match e {
                    // a revert settled the transaction; a timeout already names it
                    ChainError::Reverted { .. } | ChainError::FinalityTimeout { .. } => e,
                    other => ChainError::Unconfirmed {
                        tx_hash,
                        source: Box::new(other),
                    },
                })
            }
        }
    }

    /// Deposit `amount` of `token` against `commitment`.
    ///
    /// Returns only once the transaction is final; a submitted but
    /// unconfirmed deposit is never reported as done.
    pub async fn deposit<A: LedgerAccount>(
        &self,
        account: &A,
        pool: PoolId,
        token: Felt,
        commitment: Felt,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let call = Call::new(
            self.pool_address(pool),
            "deposit",
            deposit_calldata(token, commitment, amount),
        );
        let tx_hash = self.submit(account, call).await?;
        info!(%tx_hash, %pool, %commitment, "deposit final");
        Ok(tx_hash)
    }

    /// Withdraw against a nullifier. The pool rejects nullifiers it has seen.
    pub async fn withdraw<A: LedgerAccount>(
        &self,
        account: &A,
        pool: PoolId,
        token: Felt,
        nullifier: Felt,
        recipient: Felt,
        secret: Option<Felt>,
    ) -> Result<TxHash, ChainError> {
        let call = Call::new(
            self.pool_address(pool),
            "withdraw",
            withdraw_calldata(token, nullifier, recipient, secret),
        );
        self.submit(account, call).await
    }

    pub async fn get_balance(&self, pool: PoolId, token: Felt) -> Result<U256, ChainError> {
        let words = self
            .view("get_balance", Call::new(self.pool_address(pool), "get_balance", vec![token]))
            .await?;
        decode_u256(&words, "get_balance")
    }

    pub async fn get_current_root(&self, pool: PoolId) -> Result<Felt, ChainError> {
        let words = self
            .view("get_current_root", Call::new(self.pool_address(pool), "get_current_root", vec![]))
            .await?;
        decode_single(&words, "get_current_root")
    }

    pub async fn get_next_leaf_index(&self, pool: PoolId) -> Result<u32, ChainError> {
        let words = self
            .view(
                "get_next_leaf_index",
                Call::new(self.pool_address(pool), "get_next_leaf_index", vec![]),
            )
            .await?;
        decode_single(&words, "get_next_leaf_index")?
            .to_u128()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ChainError::MalformedResponse("get_next_leaf_index: not a u32".into()))
    }

    pub async fn is_token_supported(&self, pool: PoolId, token: Felt) -> Result<bool, ChainError> {
        let words = self
            .view(
                "is_token_supported",
                Call::new(self.pool_address(pool), "is_token_supported", vec![token]),
            )
            .await?;
        let flag = decode_single(&words, "is_token_supported")?;
        if flag == Felt::ZERO {
            Ok(false)
        } else if flag == Felt::ONE {
            Ok(true)
        } else {
            Err(ChainError::MalformedResponse(format!(
                "is_token_supported: {flag} is not a bool"
            )))
        }
    }

    /// Balances of every supported token. A token whose reads fail is skipped.
    pub async fn get_all_pool_balances(&self, pool: PoolId, tokens: &[Token]) -> Vec<TokenBalance> {
        let mut balances = Vec::new();
        for token in tokens {
            let Ok(address) = token_address(token) else {
                continue;
            };
            match self.is_token_supported(pool, address).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(symbol = %token.symbol, %pool, error = %e, "skipping token");
                    continue;
                }
            }
            match self.get_balance(pool, address).await {
                Ok(balance) => balances.push(TokenBalance {
                    symbol: token.symbol.clone(),
                    token: address,
                    balance,
                    decimals: token.decimals,
                }),
                Err(e) => warn!(symbol = %token.symbol, %pool, error = %e, "skipping token"),
            }
        }
        debug!(%pool, count = balances.len(), "pool balances");
        balances
    }

    pub async fn get_pool_stats(&self, pool: PoolId, tokens: &[Token]) -> Result<PoolStats, ChainError> {
        let current_root = self.get_current_root(pool).await?;
        let next_leaf_index = self.get_next_leaf_index(pool).await?;
        let balances = self.get_all_pool_balances(pool, tokens).await;
        Ok(PoolStats {
            pool,
            address: self.pool_address(pool),
            current_root,
            next_leaf_index,
            balances,
        })
    }
}

// ============================================================================
// Token Client
// ============================================================================

/// ERC-20 style `balanceOf` / `allowance` / `approve`
#[derive(Debug, Clone)]
pub struct TokenClient<R> {
    reader: R,
    retry: RetryPolicy,
    finality: FinalityPolicy,
}

impl<R: LedgerReader> TokenClient<R> {
    pub fn new(reader: R, retry: RetryPolicy, finality: FinalityPolicy) -> Self {
        Self {
            reader,
            retry,
            finality,
        }
    }

    pub async fn balance_of(&self, token: Felt, account: Felt) -> Result<U256, ChainError> {
        let call = Call::new(token, "balanceOf", vec![account]);
        let words = read_with_retry(&self.retry, "balanceOf", || self.reader.call(&call)).await?;
        decode_u256(&words, "balanceOf")
    }

    pub async fn allowance(&self, token: Felt, owner: Felt, spender: Felt) -> Result<U256, ChainError> {
        let call = Call::new(token, "allowance", vec![owner, spender]);
        let words = read_with_retry(&self.retry, "allowance", || self.reader.call(&call)).await?;
        decode_u256(&words, "allowance")
    }

    /// Submit `approve(spender, amount)` and wait for it to be final
    pub async fn approve<A: LedgerAccount>(
        &self,
        account: &A,
        token: Felt,
        spender: Felt,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let call = Call::new(token, "approve", approve_calldata(spender, amount));
        let tx_hash = account.execute(&[call]).await?;
        info!(%tx_hash, %token, %spender, %amount, "approval submitted");
        wait_for_finality(&self.reader, &tx_hash, &self.finality).await?;
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedLedger;
    use crate::swap::TokenRegistry;

    #[test]
    fn test_withdraw_calldata_option_tag() {
        let (t, n, r) = (Felt::from_u128(1), Felt::from_u128(2), Felt::from_u128(3));
        assert_eq!(withdraw_calldata(t, n, r, None), vec![t, n, r, Felt::ZERO]);
        assert_eq!(
            withdraw_calldata(t, n, r, Some(Felt::from_u128(9))),
            vec![t, n, r, Felt::ONE, Felt::from_u128(9)]
        );
    }

    #[test]
    fn test_deposit_calldata_limbs() {
        let amount = U256::from_limbs(5, 7);
        let calldata = deposit_calldata(Felt::from_u128(1), Felt::from_u128(2), amount);
        assert_eq!(calldata[2], Felt::from_u128(5));
        assert_eq!(calldata[3], Felt::from_u128(7));
    }

    #[test]
    fn test_decode_u256_rejects_short_result() {
        assert!(decode_u256(&[Felt::ONE], "x").is_err());
        assert_eq!(decode_u256(&[Felt::ONE, Felt::ZERO], "x").unwrap(), U256::from(1u128));
    }

    async fn setup() -> (SimulatedLedger, PoolClient<SimulatedLedger>, TokenRegistry) {
        let registry = TokenRegistry::default();
        let pools = PoolAddresses::default();
        let ledger = SimulatedLedger::new();
        let strk = registry.by_symbol("STRK").unwrap().address.unwrap();
        let veil = registry.by_symbol("VEIL").unwrap().address.unwrap();
        for token in registry.ledger_tokens() {
            ledger.deploy_token(token.address.unwrap()).await;
        }
        ledger.deploy_pool(pools.fast, &[strk, veil]).await.unwrap();
        let client = PoolClient::new(ledger.clone(), pools, RetryPolicy::no_retry(), FinalityPolicy::default());
        (ledger, client, registry)
    }

    #[tokio::test]
    async fn test_pool_reads() {
        let (_ledger, client, registry) = setup().await;
        let strk = registry.by_symbol("STRK").unwrap().address.unwrap();
        let eth = registry.by_symbol("ETH").unwrap().address.unwrap();

        assert!(client.is_token_supported(PoolId::Fast, strk).await.unwrap());
        assert!(!client.is_token_supported(PoolId::Fast, eth).await.unwrap());
        assert_eq!(client.get_next_leaf_index(PoolId::Fast).await.unwrap(), 0);
        assert_eq!(client.get_balance(PoolId::Fast, strk).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_pool_stats_only_supported_tokens() {
        let (_ledger, client, registry) = setup().await;
        let stats = client
            .get_pool_stats(PoolId::Fast, &registry.ledger_tokens())
            .await
            .unwrap();
        let symbols: Vec<_> = stats.balances.iter().map(|b| b.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["STRK", "VEIL"]);
    }

    #[tokio::test]
    async fn test_unsupported_token_deposit_reverts_verbatim() {
        let (ledger, client, registry) = setup().await;
        let eth = registry.by_symbol("ETH").unwrap().address.unwrap();
        let user = Felt::from_u128(0x1234);
        ledger.set_balance(eth, user, U256::from(10u128)).await;

        let err = client
            .deposit(&ledger.account(user), PoolId::Fast, eth, Felt::from_u128(77), U256::from(1u128))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::Reverted {
                reason: "Pool: token not supported".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_pool_contract_surfaces_revert() {
        let (_ledger, client, _) = setup().await;
        let err = client.get_current_root(PoolId::Standard).await.unwrap_err();
        assert!(matches!(err, ChainError::Reverted { .. }));
    }

    #[tokio::test]
    async fn test_token_client_approve() {
        let (ledger, client, registry) = setup().await;
        let strk = registry.by_symbol("STRK").unwrap().address.unwrap();
        let user = Felt::from_u128(0x1234);
        let tokens = TokenClient::new(ledger.clone(), RetryPolicy::no_retry(), FinalityPolicy::default());
        let pool = client.pool_address(PoolId::Fast);

        tokens
            .approve(&ledger.account(user), strk, pool, U256::from(80u128))
            .await
            .unwrap();
        assert_eq!(tokens.allowance(strk, user, pool).await.unwrap(), U256::from(80u128));
    }
}
