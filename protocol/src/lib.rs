//! Shadow Swap protocol core
//!
//! Client side of an HTLC swap between a commitment-based privacy pool on
//! Starknet (the ledger chain) and Zcash (the private chain), brokered by an
//! off-chain relayer.
//!
//! Flow of a swap:
//! 1. [`crypto`] derives `(secret, blinding_factor, commitment, hash_lock)`
//! 2. [`reconcile`] makes sure the pool may spend the user's tokens
//! 3. [`pool`] deposits the commitment and funds, waiting for finality
//! 4. [`relayer`] registers the swap intent (never the secret)
//! 5. [`monitor`] follows the relayer-authoritative status to a terminal state
//!
//! [`orchestrator::SwapOrchestrator`] runs steps 1-4 in order.

pub mod amount;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod felt;
pub mod merkle;
pub mod monitor;
pub mod orchestrator;
pub mod pool;
pub mod reconcile;
pub mod relayer;
pub mod swap;

pub use amount::{from_base_units, split_u256, to_base_units, U256};
pub use chain::{Call, LedgerAccount, LedgerReader, TxHash};
pub use crypto::{generate_swap_parameters, verify_secret, CommitmentScheme, PoseidonBn254, StarknetPoseidon, SwapParameters};
pub use error::{FundsState, SwapError, SwapStage};
pub use felt::Felt;
pub use monitor::{monitor_swap, spawn_monitor, MonitorConfig, MonitorHandle};
pub use orchestrator::{SwapOrchestrator, SwapRequest, SwapResult};
pub use reconcile::{ApprovalOutcome, BalanceCache, Reconciler};
pub use relayer::{Relayer, RelayerClient};
pub use swap::{Chain, PoolId, SwapDirection, SwapIntent, SwapStatus, Token, TokenRegistry};

#[cfg(test)]
mod tests;

#[cfg(test)]
mod test_vectors;
