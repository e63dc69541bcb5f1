//! LMDB implementation of ProgressStore.

use heed::RwTxn;

use attest_store::{ProgressStore, StoreError};
use attest_types::Progress;

use crate::environment::{decode, encode};
use crate::{LmdbEnvironment, LmdbError};

pub(crate) fn write_progress(
    env: &LmdbEnvironment,
    txn: &mut RwTxn,
    progress: &Progress,
) -> Result<(), StoreError> {
    let bytes = encode(progress)?;
    env.progress_db
        .put(txn, progress.name.as_bytes(), &bytes)
        .map_err(LmdbError::from)?;
    Ok(())
}

impl ProgressStore for LmdbEnvironment {
    fn get_progress(&self, name: &str) -> Result<Option<Progress>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        self.progress_db
            .get(&rtxn, name.as_bytes())
            .map_err(LmdbError::from)?
            .map(decode)
            .transpose()
    }

    fn put_progress(&self, progress: &Progress) -> Result<(), StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        write_progress(self, &mut wtxn, progress)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::test_support::temp_env;
    use attest_types::Timestamp;

    #[test]
    fn missing_stream_has_no_progress() {
        let (_dir, env) = temp_env();
        assert_eq!(env.get_progress("p-chain").unwrap(), None);
    }

    #[test]
    fn progress_overwrites() {
        let (_dir, env) = temp_env();
        let p = Progress::new("voting");
        env.put_progress(&p).unwrap();
        let next = p.advanced(5, 0, Timestamp::new(100));
        env.put_progress(&next).unwrap();
        assert_eq!(env.get_progress("voting").unwrap(), Some(next));
    }
}
