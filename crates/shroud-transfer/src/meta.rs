use serde::{Deserialize, Serialize};

use crate::error::{TransferError, TransferResult};

/// File attributes stored, encrypted, next to the file on the storage node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Milliseconds since the Unix epoch. Older uploads omit it.
    #[serde(default)]
    pub last_modified: i64,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

impl FileMeta {
    pub fn new(size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            last_modified: chrono::Utc::now().timestamp_millis(),
            size,
            mime_type: mime_type.into(),
        }
    }

    pub fn to_json(&self) -> TransferResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TransferError::Metadata(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> TransferResult<Self> {
        serde_json::from_slice(data).map_err(|e| TransferError::Metadata(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        let meta = FileMeta {
            last_modified: 5,
            size: 10,
            mime_type: "text/plain".into(),
        };
        let json: serde_json::Value = serde_json::from_slice(&meta.to_json().unwrap()).unwrap();
        assert_eq!(json["lastModified"], 5);
        assert_eq!(json["type"], "text/plain");
    }

    #[test]
    fn missing_last_modified_defaults() {
        let meta = FileMeta::from_json(br#"{"size":3}"#).unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.last_modified, 0);
        assert!(FileMeta::from_json(b"nope").is_err());
    }
}
