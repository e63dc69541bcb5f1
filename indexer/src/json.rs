//! Reference processor for ledgers whose containers are JSON documents.
//!
//! A container looks like
//! `{"height": 7, "timestamp": 1700000000, "txs": [...]}` and each
//! transaction carries hex ids, its outputs (addresses in the configured
//! prefix format), the outputs it spends and, for validator and delegator
//! transactions, its staking details.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use attest_types::{
    AddressFormat, Input, NodeId, Output, StakeInfo, Timestamp, TransactionRow, TxId, TxType,
    TypesError,
};

use crate::ledger::{Container, LedgerClient};
use crate::processor::{BatchProcessor, BatchRows};
use crate::resolver::OutputFetcher;
use crate::IndexerError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonContainer {
    pub height: u64,
    pub timestamp: u64,
    #[serde(default)]
    pub txs: Vec<JsonTx>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonTx {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    #[serde(default)]
    pub inputs: Vec<JsonInput>,
    #[serde(default)]
    pub outputs: Vec<JsonOutput>,
    #[serde(default)]
    pub stake: Option<JsonStake>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonInput {
    pub tx_id: String,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOutput {
    pub amount: u64,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonStake {
    pub node_id: String,
    pub start: u64,
    pub end: u64,
    pub weight: u64,
    #[serde(default)]
    pub signer_public_key: Option<String>,
}

/// Decode the outputs of one transaction. Output indices follow array order.
pub fn decode_outputs(
    format: &AddressFormat,
    tx_id: TxId,
    outputs: &[JsonOutput],
) -> Result<Vec<Output>, IndexerError> {
    outputs
        .iter()
        .enumerate()
        .map(|(index, output)| {
            Ok(Output {
                tx_id,
                index: index as u32,
                amount: output.amount,
                address: format.parse(&output.address)?,
            })
        })
        .collect()
}

fn decode_stake(stake: &JsonStake) -> Result<StakeInfo, IndexerError> {
    let signer_public_key = stake
        .signer_public_key
        .as_deref()
        .map(|key| hex::decode(key.strip_prefix("0x").unwrap_or(key)))
        .transpose()
        .map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    Ok(StakeInfo {
        node_id: stake.node_id.parse::<NodeId>()?,
        start_time: Timestamp::new(stake.start),
        end_time: Timestamp::new(stake.end),
        weight: stake.weight,
        signer_public_key,
    })
}

/// [`BatchProcessor`] for JSON containers.
pub struct JsonBatchProcessor {
    format: AddressFormat,
    rows: BatchRows,
}

impl JsonBatchProcessor {
    pub fn new(format: AddressFormat) -> Self {
        Self {
            format,
            rows: BatchRows::default(),
        }
    }

    fn add_tx(&mut self, container: &Container, header: &JsonContainer, tx: &JsonTx) -> Result<(), IndexerError> {
        let id = tx.id.parse::<TxId>()?;
        let stake = tx.stake.as_ref().map(decode_stake).transpose()?;
        if tx.tx_type.is_staking() && stake.is_none() {
            return Err(IndexerError::Transform {
                index: container.index,
                reason: format!("{} transaction {id} has no stake", tx.tx_type),
            });
        }

        self.rows
            .outputs
            .extend(decode_outputs(&self.format, id, &tx.outputs)?);
        for input in &tx.inputs {
            let referenced = input.tx_id.parse::<TxId>()?;
            self.rows
                .inputs
                .push(Input::spending(id, referenced, input.index));
        }
        self.rows.transactions.push(TransactionRow {
            id,
            tx_type: tx.tx_type,
            container_index: container.index,
            block_height: header.height,
            timestamp: Timestamp::new(header.timestamp),
            stake,
        });
        Ok(())
    }
}

impl BatchProcessor for JsonBatchProcessor {
    fn reset(&mut self, expected_size: usize) {
        self.rows = BatchRows {
            transactions: Vec::with_capacity(expected_size),
            outputs: Vec::new(),
            inputs: Vec::new(),
        };
    }

    fn add_container(&mut self, container: &Container) -> Result<(), IndexerError> {
        let header: JsonContainer =
            serde_json::from_slice(&container.bytes).map_err(|e| IndexerError::Transform {
                index: container.index,
                reason: e.to_string(),
            })?;
        for tx in &header.txs {
            self.add_tx(container, &header, tx)?;
        }
        Ok(())
    }

    fn process_batch(&mut self) -> Result<BatchRows, IndexerError> {
        Ok(std::mem::take(&mut self.rows))
    }
}

/// Remote tier of the resolver: materialises a transaction's outputs from
/// the ledger's `getTx` endpoint.
pub struct LedgerOutputFetcher<L> {
    ledger: Arc<L>,
    format: AddressFormat,
}

impl<L: LedgerClient> LedgerOutputFetcher<L> {
    pub fn new(ledger: Arc<L>, format: AddressFormat) -> Self {
        Self { ledger, format }
    }
}

#[async_trait]
impl<L: LedgerClient> OutputFetcher for LedgerOutputFetcher<L> {
    async fn fetch_outputs(&self, tx_id: &TxId) -> Result<Vec<Output>, IndexerError> {
        let bytes = self.ledger.transaction(tx_id).await?;
        let tx: JsonTx = serde_json::from_slice(&bytes).map_err(|e| IndexerError::Transform {
            index: 0,
            reason: format!("transaction {tx_id}: {e}"),
        })?;
        decode_outputs(&self.format, *tx_id, &tx.outputs)
    }
}
