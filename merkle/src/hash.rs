//! Keccak-256 hashing and the 32-byte hash type.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// A 32-byte hash: Merkle leaves, nodes and roots.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct H256([u8; 32]);

impl H256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for H256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut out)?;
        Ok(Self(out))
    }
}

/// Compute the Keccak-256 hash of arbitrary data.
pub fn keccak256(data: &[u8]) -> H256 {
    keccak256_multi(&[data])
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn keccak256_multi(parts: &[&[u8]]) -> H256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    H256(output)
}

/// Hash two nodes in ascending order, so `hash_pair(a, b) == hash_pair(b, a)`.
pub fn hash_pair(a: &H256, b: &H256) -> H256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    keccak256_multi(&[lo.as_bytes(), hi.as_bytes()])
}

/// Root committed for an epoch with no transactions: `keccak256(0x00…00)`.
///
/// Distinct from the zero hash, which contracts use for "nothing committed".
pub fn empty_root() -> H256 {
    keccak256(&[0u8; 32])
}
