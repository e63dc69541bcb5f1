//! Failure taxonomy shared by the indexing loop and the cronjobs.

use std::fmt;

/// How a failed cycle should be treated by the loop that ran it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Remote timeout or service error. Retried on the next tick.
    Transient,
    /// Indexed data disagrees with itself or with a contract (unresolved
    /// input, Merkle root mismatch). Needs an operator.
    DataInconsistency,
    /// A contract rejection that is equivalent to success.
    KnownBenign,
    /// Invalid configuration detected at startup.
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::DataInconsistency => "data_inconsistency",
            ErrorKind::KnownBenign => "known_benign",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
