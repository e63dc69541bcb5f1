//! UTXO rows: outputs produced by transactions and inputs spending them.

use serde::{Deserialize, Serialize};

use crate::{Address, TxId};

/// Reference to a single output: `(tx id, output index)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: TxId,
    pub index: u32,
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// An output produced by a transaction. Immutable once persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub tx_id: TxId,
    pub index: u32,
    pub amount: u64,
    pub address: Address,
}

impl Output {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_id: self.tx_id,
            index: self.index,
        }
    }
}

/// An input spending a prior output.
///
/// `address` stays `None` until the UTXO resolver fills it from the
/// referenced output; an input is never persisted unresolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub tx_id: TxId,
    pub referenced_tx_id: TxId,
    pub referenced_index: u32,
    pub amount: u64,
    pub address: Option<Address>,
}

impl Input {
    /// A fresh, unresolved input.
    pub fn spending(tx_id: TxId, referenced_tx_id: TxId, referenced_index: u32) -> Self {
        Self {
            tx_id,
            referenced_tx_id,
            referenced_index,
            amount: 0,
            address: None,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_id: self.referenced_tx_id,
            index: self.referenced_index,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.address.is_some()
    }

    /// Copy amount and address from the output this input spends.
    pub fn resolve_from(&mut self, output: &Output) {
        self.amount = output.amount;
        self.address = Some(output.address);
    }
}
