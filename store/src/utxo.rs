//! Output lookup trait used by UTXO resolution.

use attest_types::{Output, TxId};

use crate::StoreError;

pub trait OutputStore {
    /// All persisted outputs of the given transactions, in one query.
    fn get_outputs(&self, tx_ids: &[TxId]) -> Result<Vec<Output>, StoreError>;
}
