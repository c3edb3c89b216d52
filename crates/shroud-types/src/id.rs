use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier of a metadata DAG vertex.
///
/// A `VertexId` is a BLAKE3 hash over a vertex's encrypted payload and its
/// sorted parent ids. Identical content at the same history position always
/// produces the same id, which is what makes re-inserting a vertex a no-op.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId([u8; 32]);

impl VertexId {
    /// Size of a vertex id in bytes.
    pub const SIZE: usize = 32;

    /// Create a `VertexId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Parse from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidByteLength {
            expected: Self::SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
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
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VertexId({})", self.short_hex())
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for VertexId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<VertexId> for [u8; 32] {
    fn from(id: VertexId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let id = VertexId::from_hash([7; 32]);
        let parsed = VertexId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let err = VertexId::from_slice(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidByteLength {
                expected: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(VertexId::from_hash([1; 32]).short_hex().len(), 8);
    }

    #[test]
    fn ordering_is_bytewise() {
        let a = VertexId::from_hash([0; 32]);
        let b = VertexId::from_hash([1; 32]);
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrip() {
        let id = VertexId::from_hash([3; 32]);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: VertexId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
