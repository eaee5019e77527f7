//! Error taxonomy
//!
//! One enum per layer. Lower layers are wrapped, never flattened, so callers
//! can always tell an input error from a chain revert from a relayer refusal.

use thiserror::Error;

use crate::amount::U256;
use crate::chain::TxHash;
use crate::crypto::SwapParameters;

/// Decimal / base-unit conversion failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is not a decimal number: {0:?}")]
    NonNumeric(String),

    #[error("amount {0} does not fit in 256 bits")]
    Overflow(String),

    #[error("{0} decimals is more than a 256-bit amount can carry")]
    TooManyDecimals(u32),
}

/// Field element parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeltError {
    #[error("invalid hex field element: {0:?}")]
    InvalidHex(String),

    #[error("value {0} is not below the field modulus")]
    OutOfRange(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The OS randomness source failed. Swaps must abort, never fall back.
    #[error("randomness source unavailable: {0}")]
    RandomnessUnavailable(String),

    #[error("commitment hash failed: {0}")]
    Commitment(String),

    #[error("invalid secret encoding: {0}")]
    InvalidSecret(String),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Ledger-chain failures, from either the transport or the contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Contract-level revert, reason kept verbatim
    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("transaction {tx_hash} not final after {waited_secs}s")]
    FinalityTimeout { tx_hash: TxHash, waited_secs: u64 },

    #[error("account cannot sign transactions")]
    SigningUnavailable,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Submitted, but its outcome could not be confirmed
    #[error("transaction {tx_hash} submitted but not confirmed: {source}")]
    Unconfirmed {
        tx_hash: TxHash,
        #[source]
        source: Box<ChainError>,
    },
}

impl ChainError {
    /// Whether a read that failed this way may be retried
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Transport(_) => true,
            // JSON-RPC internal error / rate limiting
            ChainError::Rpc { code, .. } => *code == -32603 || *code == 429,
            _ => false,
        }
    }

    /// Hash of a transaction that reached the sequencer before this failure
    pub fn submitted_tx(&self) -> Option<TxHash> {
        match self {
            ChainError::FinalityTimeout { tx_hash, .. } | ChainError::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: U256, need: U256 },

    #[error("approval did not take effect: allowance {allowance}, need {need}")]
    ApprovalFailed {
        allowance: U256,
        need: U256,
        tx_hash: Option<TxHash>,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayerError {
    /// Non-2xx or `success: false`, with the relayer's own message
    #[error("relayer rejected request: {message}")]
    Rejected { status: Option<u16>, message: String },

    #[error("relayer unreachable: {0}")]
    Transport(String),

    #[error("unexpected relayer response: {0}")]
    Decode(String),

    #[error("unknown swap status {0:?}")]
    UnknownStatus(String),

    #[error("no HMAC secret configured for authenticated relayer calls")]
    MissingHmacSecret,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Illegal status change observed on a swap intent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("swap status cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: crate::swap::SwapStatus,
    pub to: crate::swap::SwapStatus,
}

// ============================================================================
// Swap Errors
// ============================================================================

/// Furthest step a swap attempt completed before failing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SwapStage {
    NotStarted,
    Validated,
    ParametersGenerated,
    BalanceReconciled,
    Deposited,
    Registered,
}

/// What happened to the user's funds when a swap attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundsState {
    /// Nothing was transferred
    NotMoved,
    /// Deposit is final on the ledger chain; recover through the refund path
    Committed { tx_hash: TxHash },
    /// A deposit may or may not have landed
    Unknown { tx_hash: Option<TxHash> },
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("unknown token {0}")]
    UnknownToken(String),

    #[error("invalid swap: {0}")]
    InvalidRequest(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("price quote failed: {0}")]
    Quote(#[source] RelayerError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("balance check failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Deposit rejected before or by the contract; nothing moved
    #[error("deposit failed: {0}")]
    Deposit(#[source] ChainError),

    /// Deposit may have landed. Keep the parameters until the chain says otherwise.
    #[error(
        "deposit outcome unknown{}: {source}. Keep the swap secret; the funds may be in the pool",
        .deposit_tx.map(|tx| format!(" ({tx})")).unwrap_or_default()
    )]
    DepositUnconfirmed {
        deposit_tx: Option<TxHash>,
        params: Box<SwapParameters>,
        #[source]
        source: ChainError,
    },

    /// Relayer refused the swap before any funds moved
    #[error("relayer registration failed, no funds moved: {0}")]
    Relayer(#[source] RelayerError),

    /// Deposit is final but the relayer never recorded the swap.
    /// Do not resubmit; keep the parameters and use the refund path.
    #[error(
        "deposit {deposit_tx} succeeded but relayer registration failed: {source}. \
         Do not resubmit; keep the swap secret and use the refund path"
    )]
    RegistrationFailed {
        deposit_tx: TxHash,
        params: Box<SwapParameters>,
        #[source]
        source: RelayerError,
    },
}

impl SwapError {
    pub fn funds_state(&self) -> FundsState {
        match self {
            SwapError::RegistrationFailed { deposit_tx, .. } => FundsState::Committed {
                tx_hash: *deposit_tx,
            },
            SwapError::DepositUnconfirmed { deposit_tx, .. } => FundsState::Unknown { tx_hash: *deposit_tx },
            _ => FundsState::NotMoved,
        }
    }

    pub fn completed_stage(&self) -> SwapStage {
        match self {
            SwapError::UnknownToken(_)
            | SwapError::InvalidRequest(_)
            | SwapError::InvalidAmount(_)
            | SwapError::ZeroAmount => SwapStage::NotStarted,
            SwapError::Quote(_) | SwapError::Crypto(_) => SwapStage::Validated,
            SwapError::Reconcile(_) => SwapStage::ParametersGenerated,
            SwapError::Deposit(_) | SwapError::DepositUnconfirmed { .. } => SwapStage::BalanceReconciled,
            SwapError::Relayer(_) => SwapStage::ParametersGenerated,
            SwapError::RegistrationFailed { .. } => SwapStage::Deposited,
        }
    }

    /// Swap parameters the caller must persist, when funds are committed
    pub fn recovery_parameters(&self) -> Option<&SwapParameters> {
        match self {
            SwapError::RegistrationFailed { params, .. } | SwapError::DepositUnconfirmed { params, .. } => {
                Some(params)
            }
            _ => None,
        }
    }
}
