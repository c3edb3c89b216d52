//! Documents kept by the account system.
//!
//! Index documents hold one key per entry, named by the base64 of the entry's
//! location, so concurrent additions from two devices merge instead of
//! overwriting each other. Folder documents keep their header fields at the
//! top level and one `file:<location>` key per contained file.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shroud_doc::{Document, State};
use shroud_protocol::b64_encode;
use shroud_types::{FileHandle, Location};

use crate::error::{SdkError, SdkResult};

pub(crate) const FILE_ENTRY_PREFIX: &str = "file:";

/// Key of a location inside an index document.
pub(crate) fn location_key(location: &Location) -> String {
    b64_encode(location.as_bytes())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesIndexEntry {
    /// Location of the file's metadata document.
    pub location: Location,
    pub handle: FileHandle,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub location: Location,
    pub handle: FileHandle,
    pub name: String,
    /// Location of the folder holding the file.
    pub folder_derive: Location,
    pub size: u64,
    pub uploaded: i64,
    pub modified: i64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub public: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldersIndexEntry {
    pub location: Location,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderFileEntry {
    pub location: Location,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMetadata {
    pub location: Location,
    pub name: String,
    pub path: String,
    pub uploaded: i64,
    pub modified: i64,
    /// Number of files in the folder.
    #[serde(skip)]
    pub size: u64,
    #[serde(skip)]
    pub files: Vec<FolderFileEntry>,
}

impl FolderMetadata {
    /// Read a folder document, collecting its `file:` entries.
    pub(crate) fn from_document(doc: &Document) -> SdkResult<Self> {
        let mut folder: FolderMetadata = doc.to_typed()?;
        for (key, value) in doc.state() {
            let Some(encoded) = key.strip_prefix(FILE_ENTRY_PREFIX) else {
                continue;
            };
            let location = decode_location(encoded)?;
            let name = value
                .as_str()
                .ok_or_else(|| SdkError::Record(format!("file entry {encoded} has no name")))?;
            folder.files.push(FolderFileEntry {
                location,
                name: name.to_string(),
            });
        }
        folder.size = folder.files.len() as u64;
        Ok(folder)
    }
}

fn decode_location(encoded: &str) -> SdkResult<Location> {
    let bytes = shroud_protocol::b64_decode(encoded).map_err(|e| SdkError::Record(e.to_string()))?;
    Ok(Location::from_slice(&bytes)?)
}

/// Top-level fields of a record, ready to be merged into a document state.
pub(crate) fn record_fields<T: Serialize>(record: &T) -> SdkResult<Map<String, Value>> {
    match serde_json::to_value(record).map_err(|e| SdkError::Record(e.to_string()))? {
        Value::Object(fields) => Ok(fields),
        other => Err(SdkError::Record(format!("expected an object, got {other}"))),
    }
}

pub(crate) fn to_value<T: Serialize>(record: &T) -> SdkResult<Value> {
    serde_json::to_value(record).map_err(|e| SdkError::Record(e.to_string()))
}

pub(crate) fn set_fields(state: &mut State, fields: Map<String, Value>) {
    state.extend(fields);
}

/// Every entry of an index document. A missing document is an empty index.
pub(crate) fn index_entries<T: DeserializeOwned>(doc: Option<&Document>) -> SdkResult<Vec<T>> {
    let Some(doc) = doc else {
        return Ok(Vec::new());
    };
    doc.state()
        .into_iter()
        .map(|(key, value)| {
            serde_json::from_value(value).map_err(|e| SdkError::Record(format!("{key}: {e}")))
        })
        .collect()
}
