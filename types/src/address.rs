//! Ledger addresses and the configured textual address format.
//!
//! Addresses are held as raw 20-byte key hashes everywhere inside the
//! workspace. Conversion to and from the ledger's textual form happens only at
//! the edges (container decoding, contract submission, logs), through an
//! [`AddressFormat`] value that is handed to each component at construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{decode_fixed, TypesError};

/// A 20-byte address (hash of the owning public key).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 20]);

impl Address {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Textual address format of the source ledger, e.g. `P-flare`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressFormat {
    prefix: String,
}

impl AddressFormat {
    /// Create a format with the given prefix. An empty prefix is a
    /// configuration error.
    pub fn new(prefix: impl Into<String>) -> Result<Self, TypesError> {
        let prefix = prefix.into();
        if prefix.trim().is_empty() {
            return Err(TypesError::MissingAddressPrefix);
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Render an address as `<prefix><hex>`.
    pub fn format(&self, address: &Address) -> String {
        format!("{}{}", self.prefix, hex::encode(address.as_bytes()))
    }

    /// Parse `<prefix><hex>` back into an address.
    pub fn parse(&self, s: &str) -> Result<Address, TypesError> {
        let body = s
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| TypesError::InvalidAddress(format!("{s}: expected prefix {}", self.prefix)))?;
        decode_fixed::<20>(body).map(Address)
    }
}
