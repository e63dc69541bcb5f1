//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address prefix must not be empty")]
    MissingAddressPrefix,

    #[error("unknown transaction type: {0}")]
    UnknownTxType(String),
}

/// Decode a hex string (with or without a `0x` prefix) into a fixed-size array.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], TypesError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| TypesError::InvalidLength { expected: N, actual })
}
