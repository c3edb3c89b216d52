use std::sync::Arc;

use serde_json::Value;
use shroud_doc::State;
use shroud_metadata::MetadataAccess;
use shroud_transfer::FileMeta;
use shroud_types::path::{basename, is_direct_child, parent};
use shroud_types::{
    clean_path, validate_directory_path, validate_filename, FileHandle, Location, LOCATION_SIZE,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{SdkError, SdkResult};
use crate::records::{
    index_entries, location_key, record_fields, set_fields, to_value, FileMetadata,
    FilesIndexEntry, FolderMetadata, FoldersIndexEntry, FILE_ENTRY_PREFIX,
};

const ACCOUNT_GUID: &str = "5b7c0640-bc3a-4fa8-b588-ca6a922c1475";
const ACCOUNT_VERSION: u32 = 2;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Per-account folder and file index stored as metadata documents.
///
/// Every public operation runs under one lock, so the read-modify-write
/// sequences touching several documents never interleave within a process.
pub struct AccountSystem {
    metadata: Arc<MetadataAccess>,
    prefix: String,
    lock: Mutex<()>,
}

impl AccountSystem {
    pub fn new(metadata: Arc<MetadataAccess>) -> Self {
        Self {
            metadata,
            prefix: format!("/{ACCOUNT_GUID}/v{ACCOUNT_VERSION}"),
            lock: Mutex::new(()),
        }
    }

    fn files_index_path(&self) -> String {
        format!("{}/files", self.prefix)
    }

    fn folders_index_path(&self) -> String {
        format!("{}/folders", self.prefix)
    }

    pub fn file_derive_path(&self, location: &Location) -> String {
        format!("{}/file/{}", self.prefix, location_key(location))
    }

    pub fn folder_derive_path(&self, location: &Location) -> String {
        format!("{}/folder/{}", self.prefix, location_key(location))
    }

    async fn random_location(&self) -> SdkResult<Location> {
        let bytes = self.metadata.crypto().random_bytes(LOCATION_SIZE).await?;
        Ok(Location::from_slice(&bytes)?)
    }

    // ---- Files ----

    pub async fn files_index(&self) -> SdkResult<Vec<FilesIndexEntry>> {
        let _guard = self.lock.lock().await;
        self.read_files_index().await
    }

    async fn read_files_index(&self) -> SdkResult<Vec<FilesIndexEntry>> {
        let doc = self.metadata.get(&self.files_index_path()).await?;
        index_entries(doc.as_ref())
    }

    pub async fn file_index_entry(&self, location: &Location) -> SdkResult<FilesIndexEntry> {
        let _guard = self.lock.lock().await;
        self.read_file_index_entry(location).await
    }

    async fn read_file_index_entry(&self, location: &Location) -> SdkResult<FilesIndexEntry> {
        self.read_files_index()
            .await?
            .into_iter()
            .find(|entry| entry.location == *location)
            .ok_or_else(|| SdkError::not_found("file", location_key(location)))
    }

    /// Location of the metadata document of the file stored under `handle`.
    pub async fn file_location_by_handle(&self, handle: &FileHandle) -> SdkResult<Location> {
        let _guard = self.lock.lock().await;
        self.read_files_index()
            .await?
            .into_iter()
            .find(|entry| entry.handle == *handle && !entry.deleted)
            .map(|entry| entry.location)
            .ok_or_else(|| SdkError::not_found("file of handle", handle.location.to_hex()))
    }

    pub async fn get_file_metadata(&self, location: &Location) -> SdkResult<FileMetadata> {
        let _guard = self.lock.lock().await;
        self.read_file_metadata(location).await
    }

    async fn read_file_metadata(&self, location: &Location) -> SdkResult<FileMetadata> {
        let path = self.file_derive_path(location);
        let doc = self
            .metadata
            .get(&path)
            .await?
            .ok_or_else(|| SdkError::not_found("file", path.clone()))?;
        Ok(doc.to_typed()?)
    }

    /// Record a file about to be uploaded into `dir` (created if missing).
    pub async fn add_upload(
        &self,
        handle: &FileHandle,
        dir: &str,
        filename: &str,
        meta: &FileMeta,
        public: bool,
    ) -> SdkResult<FileMetadata> {
        let _guard = self.lock.lock().await;
        let dir = clean_path(dir);
        validate_directory_path(&dir)?;
        validate_filename(filename)?;

        let folder = self.ensure_folder(&dir).await?;
        let location = self.random_location().await?;
        let key = location_key(&location);

        let entry = to_value(&FilesIndexEntry {
            location,
            handle: handle.clone(),
            finished: false,
            public,
            deleted: false,
        })?;
        let index_key = key.clone();
        self.metadata
            .change(&self.files_index_path(), move |state: &mut State| {
                state.insert(index_key, entry);
            })
            .await?;

        let name = filename.to_string();
        let modified = now_millis();
        self.metadata
            .change(&self.folder_derive_path(&folder.location), move |state: &mut State| {
                state.insert(format!("{FILE_ENTRY_PREFIX}{key}"), Value::from(name));
                state.insert("modified".into(), Value::from(modified));
            })
            .await?;

        let file = FileMetadata {
            location,
            handle: handle.clone(),
            name: filename.to_string(),
            folder_derive: folder.location,
            size: meta.size,
            uploaded: now_millis(),
            modified: meta.last_modified,
            mime_type: meta.mime_type.clone(),
            finished: false,
            public,
        };
        let fields = record_fields(&file)?;
        self.metadata
            .change(&self.file_derive_path(&location), move |state: &mut State| {
                set_fields(state, fields)
            })
            .await?;
        info!(dir = %dir, name = %filename, "recorded upload");
        Ok(file)
    }

    pub async fn finish_upload(&self, location: &Location) -> SdkResult<()> {
        let _guard = self.lock.lock().await;
        self.read_file_metadata(location).await?;
        self.metadata
            .change(&self.file_derive_path(location), |state: &mut State| {
                state.insert("finished".into(), Value::Bool(true));
            })
            .await?;
        let mut entry = self.read_file_index_entry(location).await?;
        entry.finished = true;
        self.put_file_index_entry(&entry).await?;
        debug!(file = %location_key(location), "upload finished");
        Ok(())
    }

    pub async fn rename_file(&self, location: &Location, new_name: &str) -> SdkResult<FileMetadata> {
        let _guard = self.lock.lock().await;
        validate_filename(new_name)?;
        let mut file = self.read_file_metadata(location).await?;
        let folder = self.read_folder_by_location(&file.folder_derive).await?;
        if !folder.files.iter().any(|f| f.location == *location) {
            return Err(SdkError::not_found(
                "file entry",
                format!("{} in {}", location_key(location), folder.path),
            ));
        }

        let name = new_name.to_string();
        self.metadata
            .change(&self.file_derive_path(location), {
                let name = name.clone();
                move |state: &mut State| {
                    state.insert("name".into(), Value::from(name));
                }
            })
            .await?;
        let entry_key = format!("{FILE_ENTRY_PREFIX}{}", location_key(location));
        self.metadata
            .change(&self.folder_derive_path(&folder.location), {
                let name = name.clone();
                move |state: &mut State| {
                    state.insert(entry_key, Value::from(name));
                }
            })
            .await?;
        file.name = name;
        Ok(file)
    }

    /// Mark the file deleted in the index and drop its metadata document and
    /// folder entry.
    pub async fn remove_file(&self, location: &Location) -> SdkResult<()> {
        let _guard = self.lock.lock().await;
        let mut entry = self.read_file_index_entry(location).await?;
        entry.deleted = true;
        self.put_file_index_entry(&entry).await?;

        let file = self.read_file_metadata(location).await?;
        self.metadata.delete(&self.file_derive_path(location)).await?;

        let entry_key = format!("{FILE_ENTRY_PREFIX}{}", location_key(location));
        let modified = now_millis();
        self.metadata
            .change(&self.folder_derive_path(&file.folder_derive), move |state: &mut State| {
                state.remove(&entry_key);
                state.insert("modified".into(), Value::from(modified));
            })
            .await?;
        info!(file = %location_key(location), "removed file");
        Ok(())
    }

    async fn put_file_index_entry(&self, entry: &FilesIndexEntry) -> SdkResult<()> {
        let key = location_key(&entry.location);
        let value = to_value(entry)?;
        self.metadata
            .change(&self.files_index_path(), move |state: &mut State| {
                state.insert(key, value);
            })
            .await?;
        Ok(())
    }

    // ---- Folders ----

    pub async fn folders_index(&self) -> SdkResult<Vec<FoldersIndexEntry>> {
        let _guard = self.lock.lock().await;
        self.read_folders_index().await
    }

    async fn read_folders_index(&self) -> SdkResult<Vec<FoldersIndexEntry>> {
        let doc = self.metadata.get(&self.folders_index_path()).await?;
        index_entries(doc.as_ref())
    }

    pub async fn folder_index_entry_by_path(&self, path: &str) -> SdkResult<FoldersIndexEntry> {
        let _guard = self.lock.lock().await;
        self.read_folder_index_entry(path).await
    }

    async fn read_folder_index_entry(&self, path: &str) -> SdkResult<FoldersIndexEntry> {
        let path = clean_path(path);
        validate_directory_path(&path)?;
        self.read_folders_index()
            .await?
            .into_iter()
            .find(|entry| entry.path == path)
            .ok_or_else(|| SdkError::not_found("folder", path))
    }

    /// Folders directly inside `path`, ordered by path.
    pub async fn folders_in_folder(&self, path: &str) -> SdkResult<Vec<FoldersIndexEntry>> {
        let _guard = self.lock.lock().await;
        let path = clean_path(path);
        validate_directory_path(&path)?;
        self.children_of(&path).await
    }

    async fn children_of(&self, path: &str) -> SdkResult<Vec<FoldersIndexEntry>> {
        let mut children: Vec<FoldersIndexEntry> = self
            .read_folders_index()
            .await?
            .into_iter()
            .filter(|entry| is_direct_child(path, &entry.path))
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    pub async fn get_folder_metadata_by_path(&self, path: &str) -> SdkResult<FolderMetadata> {
        let _guard = self.lock.lock().await;
        let entry = self.read_folder_index_entry(path).await?;
        self.read_folder_by_location(&entry.location).await
    }

    pub async fn get_folder_metadata_by_location(
        &self,
        location: &Location,
    ) -> SdkResult<FolderMetadata> {
        let _guard = self.lock.lock().await;
        self.read_folder_by_location(location).await
    }

    async fn read_folder_by_location(&self, location: &Location) -> SdkResult<FolderMetadata> {
        let path = self.folder_derive_path(location);
        let doc = self
            .metadata
            .get(&path)
            .await?
            .ok_or_else(|| SdkError::not_found("folder", path.clone()))?;
        FolderMetadata::from_document(&doc)
    }

    /// Create the folder at `path` and any missing ancestor. Existing
    /// folders are returned as they are.
    pub async fn add_folder(&self, path: &str) -> SdkResult<FolderMetadata> {
        // Another device may have added folders since the index was cached.
        self.metadata
            .mark_cache_dirty(&self.folders_index_path())
            .await?;
        let _guard = self.lock.lock().await;
        self.ensure_folder(path).await
    }

    async fn ensure_folder(&self, path: &str) -> SdkResult<FolderMetadata> {
        let path = clean_path(path);
        validate_directory_path(&path)?;

        let mut ancestors = Vec::new();
        let mut current = path.clone();
        while current != "/" {
            current = parent(&current);
            ancestors.push(current.clone());
        }
        for ancestor in ancestors.iter().rev() {
            self.ensure_single_folder(ancestor).await?;
        }
        self.ensure_single_folder(&path).await
    }

    async fn ensure_single_folder(&self, path: &str) -> SdkResult<FolderMetadata> {
        let existing = self
            .read_folders_index()
            .await?
            .into_iter()
            .find(|entry| entry.path == path);
        if let Some(entry) = existing {
            return self.read_folder_by_location(&entry.location).await;
        }

        let location = self.random_location().await?;
        let entry = to_value(&FoldersIndexEntry {
            location,
            path: path.to_string(),
        })?;
        let key = location_key(&location);
        self.metadata
            .change(&self.folders_index_path(), move |state: &mut State| {
                state.insert(key, entry);
            })
            .await?;

        let now = now_millis();
        let folder = FolderMetadata {
            location,
            name: basename(path),
            path: path.to_string(),
            uploaded: now,
            modified: now,
            size: 0,
            files: Vec::new(),
        };
        let fields = record_fields(&folder)?;
        self.metadata
            .change(&self.folder_derive_path(&location), move |state: &mut State| {
                set_fields(state, fields)
            })
            .await?;
        info!(path = %path, "added folder");
        Ok(folder)
    }

    /// Remove an empty folder.
    pub async fn remove_folder_by_path(&self, path: &str) -> SdkResult<()> {
        let _guard = self.lock.lock().await;
        let entry = self.read_folder_index_entry(path).await?;
        let folder = self.read_folder_by_location(&entry.location).await?;
        if !folder.files.is_empty() || !self.children_of(&entry.path).await?.is_empty() {
            return Err(SdkError::NotEmpty {
                kind: "folder",
                item: entry.path,
                action: "remove",
            });
        }

        self.metadata
            .delete(&self.folder_derive_path(&entry.location))
            .await?;
        let key = location_key(&entry.location);
        self.metadata
            .change(&self.folders_index_path(), move |state: &mut State| {
                state.remove(&key);
            })
            .await?;
        info!(path = %entry.path, "removed folder");
        Ok(())
    }
}
