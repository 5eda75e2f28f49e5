use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain tag prepended to every code tree digest.
const TREE_DOMAIN: &str = "scope-code-tree-v1";

/// BLAKE3 digest of a code tree payload.
///
/// The hash is domain-separated so a digest of a code tree never collides with
/// a plain BLAKE3 hash of the same bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeDigest([u8; 32]);

impl TreeDigest {
    /// Compute the digest of a payload.
    pub fn of(payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(TREE_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(payload);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create a digest from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TreeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeDigest({})", self.short_hex())
    }
}

impl fmt::Display for TreeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Parsed representation of one source module.
///
/// The payload is produced by an external parser and never interpreted here.
/// Stores and registries only move it around, compare it, and digest it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTree {
    payload: Vec<u8>,
}

impl CodeTree {
    /// Wrap parser output.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The raw parser output.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the tree and return its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Digest of the payload.
    pub fn digest(&self) -> TreeDigest {
        TreeDigest::of(&self.payload)
    }
}

impl fmt::Debug for CodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeTree")
            .field("len", &self.payload.len())
            .field("digest", &self.digest())
            .finish()
    }
}

impl From<&str> for CodeTree {
    fn from(source: &str) -> Self {
        Self::new(source.as_bytes())
    }
}
