//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use attest_store::{BatchStore, StoreError, WriteBatch};

use crate::migration::Migrator;
use crate::write_batch::LmdbWriteBatch;
use crate::LmdbError;

/// Default LMDB map size: 4 GiB.
pub const DEFAULT_MAP_SIZE: usize = 4 << 30;
/// Number of named LMDB databases.
pub const MAX_DBS: u32 = 8;

pub(crate) type RawDb = Database<Bytes, Bytes>;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    pub(crate) meta_db: RawDb,
    pub(crate) progress_db: RawDb,
    pub(crate) transactions_db: RawDb,
    pub(crate) stake_by_start_db: RawDb,
    pub(crate) outputs_db: RawDb,
    pub(crate) inputs_db: RawDb,
    pub(crate) samples_db: RawDb,
    pub(crate) aggregations_db: RawDb,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path and bring its
    /// schema up to date.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path;
        // callers never open the same directory twice concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(MAX_DBS))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let store = Self {
            meta_db: create(&env, &mut wtxn, "meta")?,
            progress_db: create(&env, &mut wtxn, "progress")?,
            transactions_db: create(&env, &mut wtxn, "transactions")?,
            stake_by_start_db: create(&env, &mut wtxn, "stake_by_start")?,
            outputs_db: create(&env, &mut wtxn, "outputs")?,
            inputs_db: create(&env, &mut wtxn, "inputs")?,
            samples_db: create(&env, &mut wtxn, "uptime_samples")?,
            aggregations_db: create(&env, &mut wtxn, "aggregations")?,
            env: env.clone(),
        };
        wtxn.commit()?;

        Migrator::run(&store)?;
        tracing::info!(path = %path.display(), "LMDB environment opened");
        Ok(store)
    }

    /// Open with the default map size.
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, MAX_DBS, DEFAULT_MAP_SIZE)
    }

    pub(crate) fn env(&self) -> &Env {
        &self.env
    }

    /// Begin a new write batch.
    pub fn begin_batch(&self) -> Result<LmdbWriteBatch<'_>, StoreError> {
        LmdbWriteBatch::new(self)
    }
}

fn create(env: &Env, wtxn: &mut RwTxn, name: &str) -> Result<RawDb, LmdbError> {
    Ok(env.create_database(wtxn, Some(name))?)
}

impl BatchStore for LmdbEnvironment {
    fn write_batch(&self) -> Result<Box<dyn WriteBatch + '_>, StoreError> {
        Ok(Box::new(self.begin_batch()?))
    }
}

/// Insert `value` under `key` unless the key already holds a value.
///
/// An identical existing value is accepted silently; a different one is a
/// uniqueness violation.
pub(crate) fn put_unique(
    db: &RawDb,
    txn: &mut RwTxn,
    key: &[u8],
    value: &[u8],
    what: &str,
) -> Result<(), StoreError> {
    let existing = db
        .get(txn, key)
        .map_err(LmdbError::from)?
        .map(|current| current == value);
    match existing {
        Some(true) => Ok(()),
        Some(false) => Err(StoreError::Duplicate(what.to_string())),
        None => {
            db.put(txn, key, value).map_err(LmdbError::from)?;
            Ok(())
        }
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes).map_err(LmdbError::from)?)
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value).map_err(LmdbError::from)?)
}
