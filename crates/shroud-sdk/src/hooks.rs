use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shroud_transfer::{TransferError, TransferHooks, TransferResult, UploadInfo};
use shroud_types::Location;

use crate::account::AccountSystem;
use crate::error::SdkError;

fn hook_error(err: SdkError) -> TransferError {
    TransferError::Hook(err.to_string())
}

/// Keeps the account index in step with one upload: the file is recorded
/// before its first byte is sent and marked finished once the storage node
/// confirmed it.
pub struct AccountIndexHooks {
    account: Arc<AccountSystem>,
    public: bool,
    recorded: Mutex<Option<Location>>,
}

impl AccountIndexHooks {
    pub fn new(account: Arc<AccountSystem>, public: bool) -> Self {
        Self {
            account,
            public,
            recorded: Mutex::new(None),
        }
    }

    /// Metadata location recorded for the upload, once `before_upload` ran.
    pub fn recorded(&self) -> Option<Location> {
        *self.recorded.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl TransferHooks for AccountIndexHooks {
    async fn before_upload(&self, upload: &UploadInfo) -> TransferResult<()> {
        let file = self
            .account
            .add_upload(&upload.handle, &upload.path, &upload.name, &upload.meta, self.public)
            .await
            .map_err(hook_error)?;
        *self.recorded.lock().expect("lock poisoned") = Some(file.location);
        Ok(())
    }

    async fn after_upload(&self, upload: &UploadInfo) -> TransferResult<()> {
        let location = match self.recorded() {
            Some(location) => location,
            None => self
                .account
                .file_location_by_handle(&upload.handle)
                .await
                .map_err(hook_error)?,
        };
        self.account
            .finish_upload(&location)
            .await
            .map_err(hook_error)
    }
}
