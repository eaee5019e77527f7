//! Ledger-chain access
//!
//! Two ports: [`LedgerReader`] for view calls and receipts, and
//! [`LedgerAccount`] for submitting signed invocations. Signing is a
//! capability handed in by the caller; this crate never holds keys.

pub mod rpc;
pub mod simulator;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ChainError;
use crate::felt::Felt;

pub use rpc::JsonRpcClient;
pub use simulator::{SimulatedAccount, SimulatedLedger};

pub type TxHash = Felt;

/// One contract invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub contract_address: Felt,
    pub entry_point: String,
    pub calldata: Vec<Felt>,
}

impl Call {
    pub fn new(contract_address: Felt, entry_point: &str, calldata: Vec<Felt>) -> Self {
        Self {
            contract_address,
            entry_point: entry_point.to_string(),
            calldata,
        }
    }

    pub fn selector(&self) -> Felt {
        Felt::selector(&self.entry_point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalityStatus {
    Received,
    AcceptedOnL2,
    AcceptedOnL1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Succeeded,
    Reverted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub finality: FinalityStatus,
    pub execution: ExecutionStatus,
}

impl TxReceipt {
    pub fn is_final(&self) -> bool {
        matches!(self.finality, FinalityStatus::AcceptedOnL2 | FinalityStatus::AcceptedOnL1)
    }
}

// ============================================================================
// Ports
// ============================================================================

/// Read-only view of the ledger chain
pub trait LedgerReader: Send + Sync {
    /// Execute a view call at the latest block
    fn call(&self, call: &Call) -> impl Future<Output = Result<Vec<Felt>, ChainError>> + Send;

    /// `Ok(None)` while the transaction is not yet known to the node
    fn transaction_receipt(
        &self,
        tx_hash: &TxHash,
    ) -> impl Future<Output = Result<Option<TxReceipt>, ChainError>> + Send;
}

/// A signing account on the ledger chain
pub trait LedgerAccount: Send + Sync {
    fn address(&self) -> Felt;

    /// Submit one transaction carrying all `calls`. Returns once the
    /// sequencer accepted it, not once it is final.
    fn execute(&self, calls: &[Call]) -> impl Future<Output = Result<TxHash, ChainError>> + Send;
}

/// Account known only by address; every submission fails
#[derive(Debug, Clone, Copy)]
pub struct WatchOnlyAccount {
    address: Felt,
}

impl WatchOnlyAccount {
    pub fn new(address: Felt) -> Self {
        Self { address }
    }
}

impl LedgerAccount for WatchOnlyAccount {
    fn address(&self) -> Felt {
        self.address
    }

    async fn execute(&self, _calls: &[Call]) -> Result<TxHash, ChainError> {
        Err(ChainError::SigningUnavailable)
    }
}

// ============================================================================
// Retry & Finality
// ============================================================================

/// Exponential backoff for reads. Only transient errors are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

pub async fn read_with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let mut delay = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!(%what, attempt, error = %e, "read failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalityPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for FinalityPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll the receipt until the transaction is final.
///
/// A reverted receipt fails immediately with the raw reason. Transient read
/// errors and unknown hashes keep polling until `policy.timeout`.
pub async fn wait_for_finality<R: LedgerReader>(
    reader: &R,
    tx_hash: &TxHash,
    policy: &FinalityPolicy,
) -> Result<TxReceipt, ChainError> {
    let started = Instant::now();
    loop {
        match reader.transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) => {
                if let ExecutionStatus::Reverted { reason } = &receipt.execution {
                    return Err(ChainError::Reverted {
                        reason: reason.clone(),
                    });
                }
                if receipt.is_final() {
                    debug!(%tx_hash, finality = ?receipt.finality, "transaction final");
                    return Ok(receipt);
                }
            }
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                warn!(%tx_hash, error = %e, "receipt poll failed");
            }
            Err(e) => return Err(e),
        }

        if started.elapsed() >= policy.timeout {
            return Err(ChainError::FinalityTimeout {
                tx_hash: *tx_hash,
                waited_secs: started.elapsed().as_secs(),
            });
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}
