//! Relayer client
//!
//! The relayer records swap intents, creates the counter-leg HTLC and is the
//! authority on swap status. [`RelayerClient`] is the seam; [`Relayer`]
//! picks the live HTTP backend or the in-memory one once, at construction.

pub mod http;
pub mod simulator;

use std::fmt;
use std::future::Future;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::amount::{multiply_decimal, parse_units, U256};
use crate::error::{AmountError, RelayerError};
use crate::swap::{SwapDirection, SwapStatus};

pub use http::HttpRelayer;
pub use simulator::{SimulatedOutcome, SimulatedRelayer};

// ============================================================================
// Wire Types
// ============================================================================

/// Decimal amount exactly as the relayer wrote it.
///
/// Accepts a JSON number or string. Numbers keep their shortest
/// round-trip text so the float never leaks into base-unit math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedAmount(String);

impl QuotedAmount {
    pub fn new(text: impl Into<String>) -> Self {
        QuotedAmount(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuotedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for QuotedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for QuotedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = QuotedAmount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal number or string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(QuotedAmount(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(QuotedAmount(v.to_string()))
            }

            // std prints the shortest text that round-trips, never in exponent form
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(QuotedAmount(v.to_string()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(QuotedAmount(v.trim().to_string()))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// `GET /price` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub from_symbol: String,
    pub to_symbol: String,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<QuotedAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<QuotedAmount>,
    pub timestamp: i64,
}

impl PriceQuote {
    /// Converted amount in base units of a token with `decimals` decimals.
    ///
    /// Falls back to `amount * rate` when the relayer sent no converted
    /// amount. Precision beyond `decimals` is truncated.
    pub fn converted_base_units(&self, decimals: u32) -> Result<U256, RelayerError> {
        let decode = |e: AmountError| RelayerError::Decode(format!("invalid converted amount: {e}"));
        let converted = match (&self.converted_amount, &self.amount) {
            (Some(converted), _) => converted.as_str().to_string(),
            (None, Some(amount)) => {
                if !self.rate.is_finite() {
                    return Err(RelayerError::Decode(format!("invalid rate {}", self.rate)));
                }
                multiply_decimal(amount.as_str(), &self.rate.to_string()).map_err(decode)?
            }
            (None, None) => {
                return Err(RelayerError::Decode("quote carries no amount to convert".into()))
            }
        };
        parse_units(&converted, decimals).map_err(decode)
    }
}

/// `GET /prices/all` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllPrices {
    pub strk_to_zec: f64,
    pub zec_to_strk: f64,
    pub strk_to_usd: f64,
    pub zec_to_usd: f64,
    pub timestamp: i64,
}

/// `POST /swap/initiate` body. Field order is the signed byte order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateSwapRequest {
    pub user_address: String,
    pub swap_direction: SwapDirection,
    pub commitment: String,
    pub hash_lock: String,
    pub starknet_amount: String,
    pub zcash_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateSwapResponse {
    pub success: bool,
    #[serde(default)]
    pub swap_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InitiateSwapResponse {
    /// Swap id of an accepted swap, or the relayer's own reason for refusing
    pub fn into_swap_id(self) -> Result<String, RelayerError> {
        match (self.success, self.swap_id) {
            (true, Some(id)) if !id.is_empty() => Ok(id),
            (true, _) => Err(RelayerError::Decode("accepted swap without swap_id".into())),
            (false, _) => Err(RelayerError::Rejected {
                status: None,
                message: self
                    .error
                    .or(self.message)
                    .unwrap_or_else(|| "swap rejected".into()),
            }),
        }
    }
}

/// `{status, data}` wrapper used by the status and stats endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    #[allow(dead_code)]
    pub status: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawStatusReport {
    pub swap_id: String,
    pub status: String,
    pub starknet_amount: String,
    pub zcash_amount: String,
    #[serde(default)]
    pub starknet_htlc_nullifier: Option<String>,
    #[serde(default)]
    pub zcash_txid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// `GET /swap/{id}` data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapStatusReport {
    pub swap_id: String,
    pub status: SwapStatus,
    pub starknet_amount: String,
    pub zcash_amount: String,
    pub starknet_htlc_nullifier: Option<String>,
    pub zcash_txid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<RawStatusReport> for SwapStatusReport {
    type Error = RelayerError;

    fn try_from(raw: RawStatusReport) -> Result<Self, Self::Error> {
        let status: SwapStatus = raw.status.parse().map_err(RelayerError::UnknownStatus)?;
        Ok(Self {
            swap_id: raw.swap_id,
            status,
            starknet_amount: raw.starknet_amount,
            zcash_amount: raw.zcash_amount,
            starknet_htlc_nullifier: raw.starknet_htlc_nullifier,
            zcash_txid: raw.zcash_txid,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerStats {
    pub total_swaps: u64,
    pub successful_swaps: u64,
    pub failed_swaps: u64,
    pub refunded_swaps: u64,
    pub pending_swaps: u64,
    pub critical_swaps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

// ============================================================================
// Client Trait
// ============================================================================

pub trait RelayerClient: Send + Sync {
    /// Exchange rate for a pair, optionally converting a decimal amount
    fn get_price(
        &self,
        from_symbol: &str,
        to_symbol: &str,
        amount: Option<&str>,
    ) -> impl Future<Output = Result<PriceQuote, RelayerError>> + Send;

    fn get_all_prices(&self) -> impl Future<Output = Result<AllPrices, RelayerError>> + Send;

    /// Fail fast when [`initiate_swap`](Self::initiate_swap) cannot succeed
    /// whatever the relayer says, before any funds move.
    fn ensure_can_initiate(&self) -> Result<(), RelayerError> {
        Ok(())
    }

    /// Register a swap and return its id. Authenticated.
    fn initiate_swap(
        &self,
        request: &InitiateSwapRequest,
    ) -> impl Future<Output = Result<String, RelayerError>> + Send;

    fn get_swap_status(
        &self,
        swap_id: &str,
    ) -> impl Future<Output = Result<SwapStatusReport, RelayerError>> + Send;

    fn get_stats(&self) -> impl Future<Output = Result<RelayerStats, RelayerError>> + Send;

    fn health(&self) -> impl Future<Output = Result<HealthStatus, RelayerError>> + Send;
}

/// Backend chosen at construction
#[derive(Debug, Clone)]
pub enum Relayer {
    Http(HttpRelayer),
    Simulated(SimulatedRelayer),
}

impl Relayer {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Relayer::Http(_) => "http",
            Relayer::Simulated(_) => "simulated",
        }
    }
}

impl RelayerClient for Relayer {
    async fn get_price(&self, from_symbol: &str, to_symbol: &str, amount: Option<&str>) -> Result<PriceQuote, RelayerError> {
        match self {
            Relayer::Http(r) => r.get_price(from_symbol, to_symbol, amount).await,
            Relayer::Simulated(r) => r.get_price(from_symbol, to_symbol, amount).await,
        }
    }

    async fn get_all_prices(&self) -> Result<AllPrices, RelayerError> {
        match self {
            Relayer::Http(r) => r.get_all_prices().await,
            Relayer::Simulated(r) => r.get_all_prices().await,
        }
    }

    fn ensure_can_initiate(&self) -> Result<(), RelayerError> {
        match self {
            Relayer::Http(r) => r.ensure_can_initiate(),
            Relayer::Simulated(r) => r.ensure_can_initiate(),
        }
    }

    async fn initiate_swap(&self, request: &InitiateSwapRequest) -> Result<String, RelayerError> {
        match self {
            Relayer::Http(r) => r.initiate_swap(request).await,
            Relayer::Simulated(r) => r.initiate_swap(request).await,
        }
    }

    async fn get_swap_status(&self, swap_id: &str) -> Result<SwapStatusReport, RelayerError> {
        match self {
            Relayer::Http(r) => r.get_swap_status(swap_id).await,
            Relayer::Simulated(r) => r.get_swap_status(swap_id).await,
        }
    }

    async fn get_stats(&self) -> Result<RelayerStats, RelayerError> {
        match self {
            Relayer::Http(r) => r.get_stats().await,
            Relayer::Simulated(r) => r.get_stats().await,
        }
    }

    async fn health(&self) -> Result<HealthStatus, RelayerError> {
        match self {
            Relayer::Http(r) => r.health().await,
            Relayer::Simulated(r) => r.health().await,
        }
    }
}

impl<T: RelayerClient> RelayerClient for std::sync::Arc<T> {
    fn get_price(
        &self,
        from_symbol: &str,
        to_symbol: &str,
        amount: Option<&str>,
    ) -> impl Future<Output = Result<PriceQuote, RelayerError>> + Send {
        (**self).get_price(from_symbol, to_symbol, amount)
    }

    fn get_all_prices(&self) -> impl Future<Output = Result<AllPrices, RelayerError>> + Send {
        (**self).get_all_prices()
    }

    fn ensure_can_initiate(&self) -> Result<(), RelayerError> {
        (**self).ensure_can_initiate()
    }

    fn initiate_swap(
        &self,
        request: &InitiateSwapRequest,
    ) -> impl Future<Output = Result<String, RelayerError>> + Send {
        (**self).initiate_swap(request)
    }

    fn get_swap_status(
        &self,
        swap_id: &str,
    ) -> impl Future<Output = Result<SwapStatusReport, RelayerError>> + Send {
        (**self).get_swap_status(swap_id)
    }

    fn get_stats(&self) -> impl Future<Output = Result<RelayerStats, RelayerError>> + Send {
        (**self).get_stats()
    }

    fn health(&self) -> impl Future<Output = Result<HealthStatus, RelayerError>> + Send {
        (**self).health()
    }
}
