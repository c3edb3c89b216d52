use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Size of a storage location in bytes.
pub const LOCATION_SIZE: usize = 32;
/// Size of a file content key in bytes.
pub const CONTENT_KEY_SIZE: usize = 32;

/// Random storage location of an uploaded file.
///
/// Sent to the storage node hex-encoded as the `fileHandle` / `fileID`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location([u8; LOCATION_SIZE]);

impl Location {
    /// Parse from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; LOCATION_SIZE] =
            bytes.try_into().map_err(|_| TypeError::InvalidByteLength {
                expected: LOCATION_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; LOCATION_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; LOCATION_SIZE]> for Location {
    fn from(bytes: [u8; LOCATION_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Everything needed to fetch and decrypt an uploaded file.
///
/// The binary form is `location (32 bytes) || content key (32 bytes)`; the
/// textual form is that binary, hex-encoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub location: Location,
    pub key: [u8; CONTENT_KEY_SIZE],
}

impl FileHandle {
    pub fn new(location: Location, key: [u8; CONTENT_KEY_SIZE]) -> Self {
        Self { location, key }
    }

    /// Binary form: location followed by content key.
    pub fn to_bytes(&self) -> [u8; LOCATION_SIZE + CONTENT_KEY_SIZE] {
        let mut out = [0u8; LOCATION_SIZE + CONTENT_KEY_SIZE];
        out[..LOCATION_SIZE].copy_from_slice(self.location.as_bytes());
        out[LOCATION_SIZE..].copy_from_slice(&self.key);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != LOCATION_SIZE + CONTENT_KEY_SIZE {
            return Err(TypeError::InvalidByteLength {
                expected: LOCATION_SIZE + CONTENT_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let location = Location::from_slice(&bytes[..LOCATION_SIZE])?;
        let mut key = [0u8; CONTENT_KEY_SIZE];
        key.copy_from_slice(&bytes[LOCATION_SIZE..]);
        Ok(Self { location, key })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle({:?}, key=<redacted>)", self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_hex_roundtrip() {
        let handle = FileHandle::new(Location::from([1; 32]), [2; 32]);
        let hex = handle.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(FileHandle::from_hex(&hex).unwrap(), handle);
    }

    #[test]
    fn handle_layout_is_location_then_key() {
        let handle = FileHandle::new(Location::from([0xAA; 32]), [0xBB; 32]);
        let bytes = handle.to_bytes();
        assert!(bytes[..32].iter().all(|b| *b == 0xAA));
        assert!(bytes[32..].iter().all(|b| *b == 0xBB));
    }

    #[test]
    fn handle_rejects_short_input() {
        let err = FileHandle::from_bytes(&[0; 40]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidByteLength { actual: 40, .. }));
    }

    #[test]
    fn debug_redacts_key() {
        let handle = FileHandle::new(Location::from([1; 32]), [2; 32]);
        assert!(format!("{handle:?}").contains("redacted"));
    }
}
