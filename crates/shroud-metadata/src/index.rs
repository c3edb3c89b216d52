use serde::{Deserialize, Serialize};
use serde_json::Value;
use shroud_doc::Document;
use shroud_protocol::{b64_decode, b64_encode};

use crate::error::{MetadataError, MetadataResult};
use crate::keys::DocumentKeys;

/// Logical path of the owner's metadata index document.
pub const METADATA_INDEX_PATH: &str = "/.shroud/metadata-index";

/// One key recorded in the metadata index.
///
/// Path-addressed documents are re-derivable from their path, so only the
/// public key is kept; public documents also carry their symmetric key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt_key: Option<String>,
}

impl IndexEntry {
    pub fn for_keys(keys: &DocumentKeys, is_public: bool) -> Self {
        Self {
            public_key: keys.store_key(),
            encrypt_key: is_public.then(|| b64_encode(keys.encrypt_key())),
        }
    }

    pub fn public_key_bytes(&self) -> MetadataResult<Vec<u8>> {
        Ok(b64_decode(&self.public_key)?)
    }

    pub fn encrypt_key_bytes(&self) -> MetadataResult<Option<Vec<u8>>> {
        self.encrypt_key
            .as_deref()
            .map(b64_decode)
            .transpose()
            .map_err(MetadataError::from)
    }

    /// JSON value stored under the entry's public key in the index.
    pub fn to_value(&self) -> MetadataResult<Value> {
        serde_json::to_value(self).map_err(|e| MetadataError::Index(e.to_string()))
    }
}

/// Every entry of an index document, ordered by public key.
pub fn index_entries(index: &Document) -> MetadataResult<Vec<IndexEntry>> {
    index
        .state()
        .into_iter()
        .map(|(key, value)| {
            serde_json::from_value(value).map_err(|e| MetadataError::Index(format!("{key}: {e}")))
        })
        .collect()
}
