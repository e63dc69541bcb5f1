//! Contract clients backed by a JSON-RPC signing gateway.
//!
//! The gateway owns the signing key and turns each call into a contract
//! transaction or view call. A JSON-RPC error object carries the revert
//! reason and becomes [`ContractError::Reverted`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use attest_merkle::H256;
use attest_types::{Address, NodeId, StakeEntry};

use crate::contracts::{AddressBinder, ContractError, MirroringContract, UptimeVoting, VotingContract};
use crate::CronjobError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Validate a `0x`-prefixed 20-byte hex contract address.
pub fn parse_contract_address(s: &str) -> Result<String, CronjobError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| CronjobError::Config(format!("contract address {s:?} lacks 0x prefix")))?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CronjobError::Config(format!(
            "contract address {s:?} is not 40 hex digits"
        )));
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

pub struct HttpContractGateway {
    http_client: reqwest::Client,
    url: String,
    contract: String,
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
    message: String,
}

impl HttpContractGateway {
    pub fn new(url: impl Into<String>, contract: &str, timeout: Duration) -> Result<Self, CronjobError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Ok(Self {
            http_client,
            url: url.into(),
            contract: parse_contract_address(contract)?,
        })
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, mut params: Value) -> Result<T, ContractError> {
        if let Value::Object(map) = &mut params {
            map.insert("contract".into(), Value::String(self.contract.clone()));
        }
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
            return Err(ContractError::Unavailable(format!(
                "{method}: HTTP status {}",
                response.status()
            )));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ContractError::InvalidResponse(format!("{method}: {e}")))?;
        unwrap_response(method, body)
    }
}

fn map_transport_error(method: &str, e: reqwest::Error) -> ContractError {
    if e.is_timeout() {
        ContractError::Timeout(format!("{method}: {e}"))
    } else {
        ContractError::Unavailable(format!("{method}: {e}"))
    }
}

fn unwrap_response<T>(method: &str, body: RpcResponse<T>) -> Result<T, ContractError> {
    if let Some(error) = body.error {
        return Err(ContractError::Reverted(error.message));
    }
    body.result
        .ok_or_else(|| ContractError::InvalidResponse(format!("{method}: missing result")))
}

fn parse_h256(s: &str) -> Result<H256, ContractError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(digits, &mut bytes)
        .map_err(|e| ContractError::InvalidResponse(format!("bad root {s:?}: {e}")))?;
    Ok(H256::new(bytes))
}

fn hex_word(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn stake_params(stake: &StakeEntry, proof: &[H256]) -> Value {
    json!({
        "stake": {
            "txType": stake.tx_type.code(),
            "txId": hex_word(stake.tx_id.as_bytes()),
            "nodeId": hex_word(stake.node_id.as_bytes()),
            "address": hex_word(stake.address.as_bytes()),
            "weight": stake.weight,
            "startTime": stake.start_time.as_secs(),
            "endTime": stake.end_time.as_secs(),
        },
        "proof": proof.iter().map(|h| hex_word(h.as_bytes())).collect::<Vec<_>>(),
    })
}

#[async_trait]
impl VotingContract for HttpContractGateway {
    async fn merkle_root(&self, epoch: u64) -> Result<H256, ContractError> {
        let root: String = self.call("voting_getMerkleRoot", json!({ "epoch": epoch })).await?;
        parse_h256(&root)
    }

    async fn should_vote(&self, epoch: u64) -> Result<bool, ContractError> {
        self.call("voting_shouldVote", json!({ "epoch": epoch })).await
    }

    async fn submit_vote(&self, epoch: u64, root: H256) -> Result<(), ContractError> {
        let _: Value = self
            .call(
                "voting_submitVote",
                json!({ "epoch": epoch, "root": hex_word(root.as_bytes()) }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MirroringContract for HttpContractGateway {
    async fn mirror_stake(&self, stake: &StakeEntry, proof: &[H256]) -> Result<(), ContractError> {
        let _: Value = self.call("mirror_mirrorStake", stake_params(stake, proof)).await?;
        Ok(())
    }
}

#[async_trait]
impl AddressBinder for HttpContractGateway {
    async fn is_address_registered(&self, address: &Address) -> Result<bool, ContractError> {
        self.call(
            "binder_isAddressRegistered",
            json!({ "address": hex_word(address.as_bytes()) }),
        )
        .await
    }

    async fn register_public_key(&self, public_key: &[u8]) -> Result<(), ContractError> {
        let _: Value = self
            .call(
                "binder_registerPublicKey",
                json!({ "publicKey": hex_word(public_key) }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UptimeVoting for HttpContractGateway {
    async fn submit_uptime_vote(&self, epoch: u64, nodes: &[NodeId]) -> Result<(), ContractError> {
        let nodes: Vec<String> = nodes.iter().map(|n| hex_word(n.as_bytes())).collect();
        let _: Value = self
            .call("uptime_submitVote", json!({ "epoch": epoch, "nodeIds": nodes }))
            .await?;
        Ok(())
    }
}
