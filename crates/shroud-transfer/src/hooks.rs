use async_trait::async_trait;
use shroud_types::FileHandle;

use crate::error::TransferResult;
use crate::meta::FileMeta;

/// What an upload is about to store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadInfo {
    pub handle: FileHandle,
    pub name: String,
    /// Logical directory the file is uploaded into.
    pub path: String,
    pub meta: FileMeta,
}

/// Callbacks around a transfer. An error from any hook fails the transfer.
#[async_trait]
pub trait TransferHooks: Send + Sync {
    async fn before_upload(&self, _upload: &UploadInfo) -> TransferResult<()> {
        Ok(())
    }

    async fn after_upload(&self, _upload: &UploadInfo) -> TransferResult<()> {
        Ok(())
    }

    async fn before_download(&self, _handle: &FileHandle) -> TransferResult<()> {
        Ok(())
    }

    async fn after_download(&self, _handle: &FileHandle, _meta: &FileMeta) -> TransferResult<()> {
        Ok(())
    }
}

pub struct NoOpHooks;

impl TransferHooks for NoOpHooks {}
