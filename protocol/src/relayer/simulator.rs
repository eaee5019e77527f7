//! In-memory relayer
//!
//! Quotes from a fixed rate table and walks each swap through
//! `initiated -> locked -> <outcome>` as its status is polled: `locked` from
//! the 2nd poll, the outcome from the 4th. Tests can hold a swap at
//! `locked`, pick the terminal outcome, refuse registrations, or make status
//! polls fail.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    AllPrices, HealthStatus, InitiateSwapRequest, PriceQuote, QuotedAmount, RelayerClient, RelayerStats,
    SwapStatusReport,
};
use crate::amount::multiply_decimal;
use crate::error::RelayerError;
use crate::swap::SwapStatus;

const LOCK_AFTER_POLLS: u32 = 2;
const SETTLE_AFTER_POLLS: u32 = 4;

// Decimal text so conversions stay exact
const RATES: &[(&str, &str, &str)] = &[
    ("STRK", "ZEC", "0.024"),
    ("STRK", "USD", "0.52"),
    ("STRK", "VEIL", "1"),
    ("ZEC", "STRK", "41.67"),
    ("ZEC", "USD", "21.50"),
    ("ZEC", "VEIL", "41.67"),
    ("VEIL", "STRK", "1"),
    ("VEIL", "ZEC", "0.024"),
    ("VEIL", "USD", "0.52"),
];

fn rate(from: &str, to: &str) -> Option<&'static str> {
    if from.eq_ignore_ascii_case(to) {
        return Some("1");
    }
    RATES
        .iter()
        .find(|(f, t, _)| f.eq_ignore_ascii_case(from) && t.eq_ignore_ascii_case(to))
        .map(|(_, _, r)| *r)
}

/// How simulated swaps end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOutcome {
    /// Stay at `locked` forever
    Hold,
    /// Settle into this terminal status
    Settle(SwapStatus),
}

#[derive(Debug)]
struct SimulatedSwap {
    request: InitiateSwapRequest,
    status: SwapStatus,
    polls: u32,
    created_at: String,
    updated_at: String,
}

#[derive(Debug)]
struct RelayerState {
    swaps: HashMap<String, SimulatedSwap>,
    outcome: SimulatedOutcome,
    reject_initiations: Option<String>,
    failing_polls: u32,
    total_polls: u64,
    received: Vec<InitiateSwapRequest>,
}

impl Default for RelayerState {
    fn default() -> Self {
        Self {
            swaps: HashMap::new(),
            outcome: SimulatedOutcome::Settle(SwapStatus::Redeemed),
            reject_initiations: None,
            failing_polls: 0,
            total_polls: 0,
            received: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedRelayer {
    state: Arc<Mutex<RelayerState>>,
}

impl SimulatedRelayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_outcome(&self, outcome: SimulatedOutcome) {
        self.state.lock().await.outcome = outcome;
    }

    /// Refuse every registration with `message`
    pub async fn reject_initiations(&self, message: &str) {
        self.state.lock().await.reject_initiations = Some(message.to_string());
    }

    /// The next `n` status polls fail at the transport level
    pub async fn fail_status_polls(&self, n: u32) {
        self.state.lock().await.failing_polls = n;
    }

    /// Status polls answered or failed so far, across all swaps
    pub async fn poll_count(&self) -> u64 {
        self.state.lock().await.total_polls
    }

    /// Every registration body received, accepted or not
    pub async fn received_requests(&self) -> Vec<InitiateSwapRequest> {
        self.state.lock().await.received.clone()
    }
}

fn short_address(address: &str) -> &str {
    let body = address.strip_prefix("0x").unwrap_or(address);
    &body[..body.len().min(6)]
}

/// Low 16 hex digits of the commitment, so ids differ across runs
fn commitment_tag(commitment: &str) -> &str {
    let body = commitment.strip_prefix("0x").unwrap_or(commitment);
    let body = body.trim_start_matches('0');
    if body.is_empty() {
        return "0";
    }
    &body[body.len().saturating_sub(16)..]
}

impl RelayerClient for SimulatedRelayer {
    async fn get_price(&self, from_symbol: &str, to_symbol: &str, amount: Option<&str>) -> Result<PriceQuote, RelayerError> {
        let rate = rate(from_symbol, to_symbol).ok_or_else(|| RelayerError::Rejected {
            status: Some(404),
            message: format!("Price not available for {}/{}", from_symbol, to_symbol),
        })?;
        let converted = amount
            .map(|a| {
                multiply_decimal(a, rate).map_err(|_| RelayerError::Rejected {
                    status: Some(400),
                    message: format!("Invalid amount: {}", a),
                })
            })
            .transpose()?;

        Ok(PriceQuote {
            from_symbol: from_symbol.to_uppercase(),
            to_symbol: to_symbol.to_uppercase(),
            rate: rate.parse().map_err(|_| RelayerError::Decode(format!("bad rate {rate}")))?,
            amount: amount.map(|a| QuotedAmount::new(a.trim())),
            converted_amount: converted.map(QuotedAmount::new),
            timestamp: Utc::now().timestamp(),
        })
    }

    async fn get_all_prices(&self) -> Result<AllPrices, RelayerError> {
        Ok(AllPrices {
            strk_to_zec: 0.024,
            zec_to_strk: 41.67,
            strk_to_usd: 0.52,
            zec_to_usd: 21.50,
            timestamp: Utc::now().timestamp(),
        })
    }

    async fn initiate_swap(&self, request: &InitiateSwapRequest) -> Result<String, RelayerError> {
        let mut state = self.state.lock().await;
        state.received.push(request.clone());

        if let Some(message) = &state.reject_initiations {
            return Err(RelayerError::Rejected {
                status: Some(400),
                message: message.clone(),
            });
        }
        if state.swaps.values().any(|s| s.request.commitment == request.commitment) {
            return Err(RelayerError::Rejected {
                status: Some(409),
                message: "Swap with this commitment already exists".into(),
            });
        }

        let mut swap_id = format!(
            "swap_{}_{}_{}",
            request.swap_direction,
            short_address(&request.user_address),
            commitment_tag(&request.commitment)
        );
        if state.swaps.contains_key(&swap_id) {
            swap_id = format!("{}_{}", swap_id, state.swaps.len() + 1);
        }
        let now = Utc::now().to_rfc3339();
        state.swaps.insert(
            swap_id.clone(),
            SimulatedSwap {
                request: request.clone(),
                status: SwapStatus::Initiated,
                polls: 0,
                created_at: now.clone(),
                updated_at: now,
            },
        );
        debug!(%swap_id, "simulated relayer registered swap");
        Ok(swap_id)
    }

    async fn get_swap_status(&self, swap_id: &str) -> Result<SwapStatusReport, RelayerError> {
        let mut state = self.state.lock().await;
        state.total_polls += 1;
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(RelayerError::Transport("simulated relayer outage".into()));
        }

        let outcome = state.outcome;
        let swap = state.swaps.get_mut(swap_id).ok_or_else(|| RelayerError::Rejected {
            status: Some(404),
            message: format!("Swap {} not found", swap_id),
        })?;

        swap.polls += 1;
        let next = match (swap.status, outcome) {
            (SwapStatus::Initiated, _) if swap.polls >= LOCK_AFTER_POLLS => SwapStatus::Locked,
            (SwapStatus::Locked, SimulatedOutcome::Settle(end)) if swap.polls >= SETTLE_AFTER_POLLS => end,
            (current, _) => current,
        };
        if next != swap.status {
            swap.status = next;
            swap.updated_at = Utc::now().to_rfc3339();
        }

        let locked_or_later = swap.status != SwapStatus::Initiated;
        Ok(SwapStatusReport {
            swap_id: swap_id.to_string(),
            status: swap.status,
            starknet_amount: swap.request.starknet_amount.clone(),
            zcash_amount: swap.request.zcash_amount.clone(),
            starknet_htlc_nullifier: locked_or_later.then(|| swap.request.commitment.clone()),
            zcash_txid: (swap.status == SwapStatus::Redeemed).then(|| format!("sim_tx_{}", swap_id)),
            created_at: swap.created_at.clone(),
            updated_at: swap.updated_at.clone(),
        })
    }

    async fn get_stats(&self) -> Result<RelayerStats, RelayerError> {
        let state = self.state.lock().await;
        let count = |status: SwapStatus| state.swaps.values().filter(|s| s.status == status).count() as u64;
        Ok(RelayerStats {
            total_swaps: state.swaps.len() as u64,
            successful_swaps: count(SwapStatus::Redeemed),
            failed_swaps: count(SwapStatus::Failed),
            refunded_swaps: count(SwapStatus::Refunded),
            pending_swaps: count(SwapStatus::Initiated) + count(SwapStatus::Locked),
            critical_swaps: 0,
        })
    }

    async fn health(&self) -> Result<HealthStatus, RelayerError> {
        Ok(HealthStatus {
            status: "healthy".into(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}
