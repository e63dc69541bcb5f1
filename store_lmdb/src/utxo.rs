//! LMDB implementation of OutputStore.

use heed::RwTxn;

use attest_store::{OutputStore, StoreError};
use attest_types::{Input, Output, TxId};

use crate::environment::{decode, encode, put_unique};
use crate::keys::{input_key, output_key};
use crate::{LmdbEnvironment, LmdbError};

pub(crate) fn write_output(
    env: &LmdbEnvironment,
    txn: &mut RwTxn,
    output: &Output,
) -> Result<(), StoreError> {
    let key = output_key(&output.tx_id, output.index);
    put_unique(
        &env.outputs_db,
        txn,
        &key,
        &encode(output)?,
        &output.outpoint().to_string(),
    )
}

pub(crate) fn write_input(
    env: &LmdbEnvironment,
    txn: &mut RwTxn,
    input: &Input,
) -> Result<(), StoreError> {
    if !input.is_resolved() {
        return Err(StoreError::InvalidRow(format!(
            "input of {} spending {} has no address",
            input.tx_id,
            input.outpoint()
        )));
    }
    let key = input_key(&input.tx_id, &input.referenced_tx_id, input.referenced_index);
    put_unique(
        &env.inputs_db,
        txn,
        &key,
        &encode(input)?,
        &format!("input {} -> {}", input.tx_id, input.outpoint()),
    )
}

impl OutputStore for LmdbEnvironment {
    fn get_outputs(&self, tx_ids: &[TxId]) -> Result<Vec<Output>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut outputs = Vec::new();
        for tx_id in tx_ids {
            for entry in self
                .outputs_db
                .prefix_iter(&rtxn, tx_id.as_bytes())
                .map_err(LmdbError::from)?
            {
                let (_, value) = entry.map_err(LmdbError::from)?;
                outputs.push(decode(value)?);
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::test_support::temp_env;
    use attest_store::{BatchStore, StoreError};
    use attest_types::Address;

    fn output(tx: u8, index: u32) -> Output {
        Output {
            tx_id: TxId::new([tx; 32]),
            index,
            amount: 100 + index as u64,
            address: Address::new([tx; 20]),
        }
    }

    #[test]
    fn outputs_are_found_by_tx_id() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().unwrap();
        for o in [output(1, 0), output(1, 1), output(2, 0)] {
            batch.put_output(&o).unwrap();
        }
        batch.commit().unwrap();

        let found = env.get_outputs(&[TxId::new([1; 32])]).unwrap();
        assert_eq!(found, vec![output(1, 0), output(1, 1)]);
        assert!(env.get_outputs(&[TxId::new([3; 32])]).unwrap().is_empty());
    }

    #[test]
    fn conflicting_output_is_rejected() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().unwrap();
        batch.put_output(&output(1, 0)).unwrap();
        let mut changed = output(1, 0);
        changed.amount += 1;
        assert!(matches!(
            batch.put_output(&changed),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn unresolved_input_is_rejected() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().unwrap();
        let input = Input::spending(TxId::new([5; 32]), TxId::new([1; 32]), 0);
        assert!(matches!(
            batch.put_input(&input),
            Err(StoreError::InvalidRow(_))
        ));
    }
}
