//! Starknet JSON-RPC reader
//!
//! Implements [`LedgerReader`] over `starknet_call` and
//! `starknet_getTransactionReceipt`. Transaction submission stays with the
//! caller's [`LedgerAccount`](super::LedgerAccount).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{Call, ExecutionStatus, FinalityStatus, LedgerReader, TxHash, TxReceipt};
use crate::error::ChainError;
use crate::felt::Felt;

/// Node error: transaction hash not found
const TXN_HASH_NOT_FOUND: i64 = 29;
/// Node error: the called contract reverted
const CONTRACT_ERROR: i64 = 40;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
    transaction_hash: Felt,
    execution_status: String,
    finality_status: String,
    #[serde(default)]
    revert_reason: Option<String>,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::Transport(format!("{} returned HTTP {}", method, status)));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", method, e)))?;

        match (envelope.result, envelope.error) {
            (_, Some(err)) => Err(map_rpc_error(err)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ChainError::MalformedResponse(format!("{}: empty response", method))),
        }
    }

    /// Chain id as a felt (`SN_MAIN`, `SN_SEPOLIA` encoded as short strings)
    pub async fn chain_id(&self) -> Result<Felt, ChainError> {
        self.request("starknet_chainId", json!([])).await
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        self.request("starknet_blockNumber", json!([])).await
    }
}

impl LedgerReader for JsonRpcClient {
    async fn call(&self, call: &Call) -> Result<Vec<Felt>, ChainError> {
        let params = json!({
            "request": {
                "contract_address": call.contract_address.to_hex(),
                "entry_point_selector": call.selector().to_hex(),
                "calldata": call.calldata.iter().map(Felt::to_hex).collect::<Vec<_>>(),
            },
            "block_id": "latest",
        });
        self.request("starknet_call", params).await
    }

    async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let params = json!({ "transaction_hash": tx_hash.to_hex() });
        match self
            .request::<RpcReceipt>("starknet_getTransactionReceipt", params)
            .await
        {
            Ok(raw) => convert_receipt(raw).map(Some),
            Err(ChainError::Rpc { code, .. }) if code == TXN_HASH_NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn map_rpc_error(err: RpcErrorBody) -> ChainError {
    let detail = match &err.data {
        Some(Value::String(s)) => format!("{}: {}", err.message, s),
        Some(Value::Object(map)) => match map.get("revert_error") {
            Some(revert) => format!("{}: {}", err.message, revert),
            None => format!("{}: {}", err.message, Value::Object(map.clone())),
        },
        Some(other) => format!("{}: {}", err.message, other),
        None => err.message.clone(),
    };

    if err.code == CONTRACT_ERROR {
        ChainError::Reverted { reason: detail }
    } else {
        ChainError::Rpc {
            code: err.code,
            message: detail,
        }
    }
}

fn convert_receipt(raw: RpcReceipt) -> Result<TxReceipt, ChainError> {
    let finality = match raw.finality_status.as_str() {
        "RECEIVED" => FinalityStatus::Received,
        "ACCEPTED_ON_L2" => FinalityStatus::AcceptedOnL2,
        "ACCEPTED_ON_L1" => FinalityStatus::AcceptedOnL1,
        // newer nodes report pre-acceptance stages; none of them are final
        other => {
            debug!(status = other, "treating unrecognized finality status as not final");
            FinalityStatus::Received
        }
    };
    let execution = match raw.execution_status.as_str() {
        "SUCCEEDED" => ExecutionStatus::Succeeded,
        "REVERTED" => ExecutionStatus::Reverted {
            reason: raw.revert_reason.unwrap_or_default(),
        },
        other => {
            return Err(ChainError::MalformedResponse(format!(
                "unknown execution status {other:?}"
            )))
        }
    };
    Ok(TxReceipt {
        tx_hash: raw.transaction_hash,
        finality,
        execution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(json: Value) -> Result<TxReceipt, ChainError> {
        convert_receipt(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_accepted_receipt() {
        let r = receipt(json!({
            "transaction_hash": "0x1234",
            "execution_status": "SUCCEEDED",
            "finality_status": "ACCEPTED_ON_L2",
            "type": "INVOKE"
        }))
        .unwrap();
        assert_eq!(r.tx_hash, Felt::from_u128(0x1234));
        assert!(r.is_final());
        assert_eq!(r.execution, ExecutionStatus::Succeeded);
    }

    #[test]
    fn test_reverted_receipt_keeps_reason() {
        let r = receipt(json!({
            "transaction_hash": "0x1",
            "execution_status": "REVERTED",
            "finality_status": "ACCEPTED_ON_L2",
            "revert_reason": "Error in the called contract: 'u256_sub Overflow'"
        }))
        .unwrap();
        assert_eq!(
            r.execution,
            ExecutionStatus::Reverted {
                reason: "Error in the called contract: 'u256_sub Overflow'".into()
            }
        );
    }

    #[test]
    fn test_pre_confirmed_receipt_is_not_final() {
        let r = receipt(json!({
            "transaction_hash": "0x1",
            "execution_status": "SUCCEEDED",
            "finality_status": "PRE_CONFIRMED"
        }))
        .unwrap();
        assert_eq!(r.finality, FinalityStatus::Received);
        assert!(!r.is_final());
    }

    #[test]
    fn test_unknown_execution_status_is_malformed() {
        let r = receipt(json!({
            "transaction_hash": "0x1",
            "execution_status": "SOMEWHERE",
            "finality_status": "ACCEPTED_ON_L2"
        }));
        assert!(matches!(r, Err(ChainError::MalformedResponse(_))));
    }

    #[test]
    fn test_contract_error_maps_to_revert() {
        let err = map_rpc_error(RpcErrorBody {
            code: 40,
            message: "Contract error".into(),
            data: Some(json!({ "revert_error": "Pool: token not supported" })),
        });
        match err {
            ChainError::Reverted { reason } => assert!(reason.contains("Pool: token not supported")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_other_rpc_errors_keep_code() {
        let err = map_rpc_error(RpcErrorBody {
            code: 20,
            message: "Contract not found".into(),
            data: None,
        });
        assert_eq!(
            err,
            ChainError::Rpc {
                code: 20,
                message: "Contract not found".into()
            }
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_envelope_shapes() {
        let ok: RpcEnvelope<Vec<Felt>> =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": ["0x1", "0x0"]})).unwrap();
        assert_eq!(ok.result.unwrap(), vec![Felt::ONE, Felt::ZERO]);

        let err: RpcEnvelope<Vec<Felt>> = serde_json::from_value(
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 29, "message": "Transaction hash not found"}}),
        )
        .unwrap();
        assert_eq!(err.error.unwrap().code, TXN_HASH_NOT_FOUND);
    }
}
