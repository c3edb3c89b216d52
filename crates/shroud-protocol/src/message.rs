//! JSON payloads and multipart forms exchanged with the nodes.
//!
//! Field names follow the node API exactly (`metadataV2Key`, `fileID`, ...).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::transport::{FormField, NetResponse};

/// Body the metadata node answers with when a key has never been written.
pub const KEY_NOT_FOUND: &str = "Key not found";

pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_decode(s: &str) -> ProtocolResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| ProtocolError::Deserialization(format!("invalid base64: {e}")))
}

// ---------------------------------------------------------------
// Metadata node
// ---------------------------------------------------------------

/// Body of `get` and `delete`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataGetRequest {
    pub metadata_v2_key: String,
}

pub type MetadataDeleteRequest = MetadataGetRequest;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataGetResponse {
    /// Base64 of the DAG binary.
    pub metadata_v2: String,
    pub expiration_date: i64,
}

/// Outcome of a metadata lookup: the "not found" sentinel is a valid answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataLookup {
    Found(MetadataGetResponse),
    NotFound,
}

impl MetadataLookup {
    /// Interpret a `get` / `get-public` response.
    ///
    /// The sentinel may arrive either as a bare string or as a JSON string.
    pub fn from_response(res: &NetResponse) -> ProtocolResult<Self> {
        let text = String::from_utf8_lossy(&res.data);
        let text = text.trim();
        if text == KEY_NOT_FOUND || text.trim_matches('"') == KEY_NOT_FOUND {
            return Ok(MetadataLookup::NotFound);
        }
        if !res.ok() {
            return Err(ProtocolError::Status {
                status: res.status,
                body: text.to_string(),
            });
        }
        Ok(MetadataLookup::Found(res.json()?))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataAddRequest {
    pub metadata_v2_key: String,
    /// Base64 of the vertex wire binary.
    pub metadata_v2_vertex: String,
    /// Base64 of each 64-byte parent edge.
    pub metadata_v2_edges: Vec<String>,
    /// Base64 signature over the DAG digest of the new vertex.
    pub metadata_v2_sig: String,
    pub is_public: bool,
}

/// Acknowledgement of an `add`. The node answers in PascalCase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataAddResponse {
    pub metadata_v2_key: String,
    pub metadata_v2: String,
    pub expiration_date: i64,
}

/// Inner, JSON-encoded query of a `get-public` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyQuery {
    pub metadata_v2_key: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMetadataGetRequest {
    pub request_body: String,
}

impl PublicMetadataGetRequest {
    /// Wrap a key with the current Unix timestamp.
    pub fn new(metadata_v2_key: String) -> ProtocolResult<Self> {
        let query = PublicKeyQuery {
            metadata_v2_key,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let request_body = serde_json::to_string(&query)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Ok(Self { request_body })
    }

    pub fn query(&self) -> ProtocolResult<PublicKeyQuery> {
        serde_json::from_str(&self.request_body)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

// ---------------------------------------------------------------
// Storage node
// ---------------------------------------------------------------

/// Body of `download` and `delete`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub file_download_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusRequest {
    pub file_handle: String,
}

/// Multipart field names.
pub mod form_fields {
    pub const FILE_HANDLE: &str = "fileHandle";
    pub const FILE_SIZE: &str = "fileSizeInByte";
    pub const METADATA: &str = "metadata";
    pub const PART_INDEX: &str = "partIndex";
    pub const END_INDEX: &str = "endIndex";
    pub const FILE_DATA: &str = "fileData";
}

/// Form opening an upload: handle, encrypted size, encrypted file metadata.
pub fn init_upload_form(file_handle: &str, size_on_fs: u64, metadata: Vec<u8>) -> Vec<FormField> {
    vec![
        FormField::text(form_fields::FILE_HANDLE, file_handle),
        FormField::text(form_fields::FILE_SIZE, size_on_fs.to_string()),
        FormField::bytes(form_fields::METADATA, metadata),
    ]
}

/// Form carrying one part. `part_index` is 1-based; `end_index` is the
/// total number of parts.
pub fn upload_part_form(
    file_handle: &str,
    part_index: u64,
    end_index: u64,
    data: Vec<u8>,
) -> Vec<FormField> {
    vec![
        FormField::text(form_fields::FILE_HANDLE, file_handle),
        FormField::text(form_fields::PART_INDEX, part_index.to_string()),
        FormField::text(form_fields::END_INDEX, end_index.to_string()),
        FormField::bytes(form_fields::FILE_DATA, data),
    ]
}
