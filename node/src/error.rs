use thiserror::Error;

use attest_utils::ErrorKind;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] attest_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] attest_store_lmdb::LmdbError),

    #[error("indexer error: {0}")]
    Indexer(#[from] attest_indexer::IndexerError),

    #[error("cronjob error: {0}")]
    Cronjob(#[from] attest_cronjobs::CronjobError),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::Config(_) => ErrorKind::Configuration,
            NodeError::Indexer(e) => e.kind(),
            NodeError::Cronjob(e) => e.kind(),
            NodeError::Store(attest_store::StoreError::Backend(_)) => ErrorKind::Transient,
            NodeError::Store(_) => ErrorKind::DataInconsistency,
            NodeError::Lmdb(_) | NodeError::Metrics(_) | NodeError::Io(_) => ErrorKind::Transient,
        }
    }
}

impl From<prometheus::Error> for NodeError {
    fn from(e: prometheus::Error) -> Self {
        NodeError::Metrics(e.to_string())
    }
}
