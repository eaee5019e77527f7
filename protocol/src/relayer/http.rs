//! Live relayer over HTTP
//!
//! `POST /swap/initiate` is authenticated: the JSON body is serialized once,
//! and `HMAC-SHA256(secret, timestamp || body)` over exactly those bytes is
//! sent as `x-signature` next to `x-timestamp` (unix seconds).

use std::fmt;
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{
    AllPrices, Envelope, HealthStatus, InitiateSwapRequest, InitiateSwapResponse, PriceQuote, RawStatusReport,
    RelayerClient, RelayerStats, SwapStatusReport,
};
use crate::error::RelayerError;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hex HMAC-SHA256 over `timestamp || body`
pub fn sign_request(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String, RelayerError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| RelayerError::MissingHmacSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Clone)]
pub struct HttpRelayer {
    http: reqwest::Client,
    base_url: Url,
    hmac_secret: Option<Zeroizing<String>>,
}

impl fmt::Debug for HttpRelayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRelayer")
            .field("base_url", &self.base_url())
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpRelayer {
    pub fn new(base_url: &str, hmac_secret: Option<String>) -> Result<Self, RelayerError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayerError::Transport(e.to_string()))?;
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| RelayerError::Transport(format!("invalid relayer url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RelayerError::Transport(format!("relayer url {base_url} cannot take a path")));
        }
        Ok(Self {
            http,
            base_url,
            hmac_secret: hmac_secret.filter(|s| !s.is_empty()).map(Zeroizing::new),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Base url plus `segments`, each percent-encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RelayerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RelayerError::Transport(format!("relayer url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T, RelayerError> {
        let url = self.endpoint(segments)?;
        debug!(path = url.path(), "relayer GET");
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| RelayerError::Transport(e.to_string()))?;
        decode_response(response).await
    }
}

/// Parse a 2xx body as `T`, or turn the error body into the relayer's own message
async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, RelayerError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RelayerError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(RelayerError::Rejected {
            status: Some(status.as_u16()),
            message: error_message(status, &text),
        });
    }
    serde_json::from_str(&text).map_err(|e| RelayerError::Decode(e.to_string()))
}

/// `message`, then `error`, then the raw body
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(message) if !message.is_empty() => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("HTTP {}", status),
    }
}

impl RelayerClient for HttpRelayer {
    async fn get_price(&self, from_symbol: &str, to_symbol: &str, amount: Option<&str>) -> Result<PriceQuote, RelayerError> {
        let mut query = vec![("from_symbol", from_symbol), ("to_symbol", to_symbol)];
        if let Some(amount) = amount {
            query.push(("amount", amount));
        }
        self.get_json(&["price"], &query).await
    }

    async fn get_all_prices(&self) -> Result<AllPrices, RelayerError> {
        self.get_json(&["prices", "all"], &[]).await
    }

    fn ensure_can_initiate(&self) -> Result<(), RelayerError> {
        match self.hmac_secret {
            Some(_) => Ok(()),
            None => Err(RelayerError::MissingHmacSecret),
        }
    }

    async fn initiate_swap(&self, request: &InitiateSwapRequest) -> Result<String, RelayerError> {
        let secret = self.hmac_secret.as_ref().ok_or(RelayerError::MissingHmacSecret)?;
        let body = serde_json::to_vec(request).map_err(|e| RelayerError::Decode(e.to_string()))?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_request(secret.as_bytes(), &timestamp, &body)?;

        let response = self
            .http
            .post(self.endpoint(&["swap", "initiate"])?)
            .header("Content-Type", "application/json")
            .header("x-timestamp", &timestamp)
            .header("x-signature", &signature)
            .body(body)
            .send()
            .await
            .map_err(|e| RelayerError::Transport(e.to_string()))?;

        let parsed: InitiateSwapResponse = decode_response(response).await?;
        let swap_id = parsed.into_swap_id()?;
        info!(%swap_id, direction = %request.swap_direction, "relayer accepted swap");
        Ok(swap_id)
    }

    async fn get_swap_status(&self, swap_id: &str) -> Result<SwapStatusReport, RelayerError> {
        let envelope: Envelope<RawStatusReport> = self.get_json(&["swap", swap_id], &[]).await?;
        SwapStatusReport::try_from(envelope.data)
    }

    async fn get_stats(&self) -> Result<RelayerStats, RelayerError> {
        let envelope: Envelope<RelayerStats> = self.get_json(&["stats"], &[]).await?;
        Ok(envelope.data)
    }

    async fn health(&self) -> Result<HealthStatus, RelayerError> {
        self.get_json(&["health"], &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_rfc4231_case_2() {
        // timestamp || body == "what do ya want for nothing?"
        let sig = sign_request(b"Jefe", "what do ya want ", b"for nothing?").unwrap();
        assert_eq!(sig, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn test_signature_covers_timestamp() {
        let a = sign_request(b"secret", "1700000000", b"{}").unwrap();
        let b = sign_request(b"secret", "1700000001", b"{}").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_error_message_extraction() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(error_message(status, r#"{"message":"bad hash lock","error":"x"}"#), "bad hash lock");
        assert_eq!(error_message(status, r#"{"error":"invalid signature"}"#), "invalid signature");
        assert_eq!(error_message(status, "upstream down"), "upstream down");
        assert_eq!(error_message(status, ""), "HTTP 400 Bad Request");
    }

    #[test]
    fn test_debug_hides_secret() {
        let relayer = HttpRelayer::new("http://localhost:8080/", Some("hunter2".into())).unwrap();
        let rendered = format!("{:?}", relayer);
        assert!(!rendered.contains("hunter2"));
        assert_eq!(relayer.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_initiate_without_secret_fails_before_network() {
        let relayer = HttpRelayer::new("http://127.0.0.1:9", None).unwrap();
        let request = InitiateSwapRequest {
            user_address: "0x1".into(),
            swap_direction: crate::swap::SwapDirection::LedgerToPrivate,
            commitment: "0x2".into(),
            hash_lock: "00".into(),
            starknet_amount: "1".into(),
            zcash_amount: "1".into(),
        };
        assert_eq!(relayer.initiate_swap(&request).await, Err(RelayerError::MissingHmacSecret));
    }

    #[test]
    fn test_missing_secret_is_known_up_front() {
        let without = HttpRelayer::new("http://127.0.0.1:9", None).unwrap();
        assert_eq!(without.ensure_can_initiate(), Err(RelayerError::MissingHmacSecret));
        let blank = HttpRelayer::new("http://127.0.0.1:9", Some(String::new())).unwrap();
        assert_eq!(blank.ensure_can_initiate(), Err(RelayerError::MissingHmacSecret));
        let with = HttpRelayer::new("http://127.0.0.1:9", Some("k".into())).unwrap();
        assert_eq!(with.ensure_can_initiate(), Ok(()));
    }

    #[test]
    fn test_swap_id_stays_one_path_segment() {
        let relayer = HttpRelayer::new("http://relayer.local:3001", None).unwrap();
        let url = relayer.endpoint(&["swap", "../stats?x=1#y"]).unwrap();
        assert_eq!(url.as_str(), "http://relayer.local:3001/swap/..%2Fstats%3Fx=1%23y");

        let prefixed = HttpRelayer::new("http://relayer.local/api/", None).unwrap();
        assert_eq!(
            prefixed.endpoint(&["swap", "swap_1"]).unwrap().as_str(),
            "http://relayer.local/api/swap/swap_1"
        );
    }

    #[test]
    fn test_unusable_base_url_rejected() {
        assert!(HttpRelayer::new("not a url", None).is_err());
        assert!(HttpRelayer::new("mailto:relayer@example.com", None).is_err());
    }
}
