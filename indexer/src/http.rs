//! JSON-RPC 2.0 ledger client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use attest_types::{NodeId, TxId};

use crate::ledger::{Container, LedgerClient, LedgerError, ValidatorStatus};

/// Default timeout for ledger requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger client speaking JSON-RPC 2.0 with hex-encoded payloads.
pub struct HttpLedgerClient {
    http_client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ContainerResponse {
    bytes: String,
    index: String,
}

#[derive(Deserialize)]
struct ContainerRangeResponse {
    containers: Vec<ContainerResponse>,
}

#[derive(Deserialize)]
struct TxResponse {
    tx: String,
}

#[derive(Deserialize)]
struct ValidatorsResponse {
    validators: Vec<ValidatorEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorEntry {
    #[serde(rename = "nodeID")]
    node_id: String,
    #[serde(default)]
    connected: bool,
}

impl HttpLedgerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            url: url.into(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(method, e))?;

        if !response.status().is_success() {
            return Err(LedgerError::Unavailable(format!(
                "{method}: HTTP status {}",
                response.status()
            )));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {e}")))?;
        unwrap_response(method, body)
    }
}

fn map_transport_error(method: &str, e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Timeout(format!("{method}: {e}"))
    } else if e.is_connect() {
        LedgerError::Unavailable(format!("{method}: connection failed: {e}"))
    } else {
        LedgerError::Unavailable(format!("{method}: {e}"))
    }
}

fn unwrap_response<T>(method: &str, body: RpcResponse<T>) -> Result<T, LedgerError> {
    if let Some(error) = body.error {
        return Err(LedgerError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    body.result
        .ok_or_else(|| LedgerError::InvalidResponse(format!("{method}: missing result")))
}

fn decode_hex(field: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = field.strip_prefix("0x").unwrap_or(field);
    hex::decode(digits).map_err(|e| LedgerError::InvalidResponse(format!("bad hex payload: {e}")))
}

fn decode_container(raw: ContainerResponse) -> Result<Container, LedgerError> {
    let index = raw
        .index
        .parse::<u64>()
        .map_err(|e| LedgerError::InvalidResponse(format!("bad container index {:?}: {e}", raw.index)))?;
    Ok(Container {
        index,
        bytes: decode_hex(&raw.bytes)?,
    })
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn last_accepted(&self) -> Result<u64, LedgerError> {
        let raw: ContainerResponse = self
            .call("index.getLastAccepted", json!({ "encoding": "hex" }))
            .await?;
        Ok(decode_container(raw)?.index)
    }

    async fn container_range(&self, from: u64, count: u64) -> Result<Vec<Container>, LedgerError> {
        let raw: ContainerRangeResponse = self
            .call(
                "index.getContainerRange",
                json!({ "startIndex": from, "numToFetch": count, "encoding": "hex" }),
            )
            .await?;
        raw.containers.into_iter().map(decode_container).collect()
    }

    async fn container_by_index(&self, index: u64) -> Result<Container, LedgerError> {
        let raw: ContainerResponse = self
            .call(
                "index.getContainerByIndex",
                json!({ "index": index, "encoding": "hex" }),
            )
            .await?;
        decode_container(raw)
    }

    async fn transaction(&self, tx_id: &TxId) -> Result<Vec<u8>, LedgerError> {
        let raw: TxResponse = self
            .call(
                "platform.getTx",
                json!({ "txID": tx_id.to_string(), "encoding": "hex" }),
            )
            .await?;
        decode_hex(&raw.tx)
    }

    async fn current_validators(&self) -> Result<Vec<ValidatorStatus>, LedgerError> {
        let raw: ValidatorsResponse = self
            .call("platform.getCurrentValidators", json!({}))
            .await?;
        raw.validators
            .into_iter()
            .map(|v| {
                let node_id = v
                    .node_id
                    .parse::<NodeId>()
                    .map_err(|e| LedgerError::InvalidResponse(format!("{}: {e}", v.node_id)))?;
                Ok(ValidatorStatus {
                    node_id,
                    connected: v.connected,
                })
            })
            .collect()
    }
}
