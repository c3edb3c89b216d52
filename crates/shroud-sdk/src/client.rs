use std::sync::Arc;

use shroud_crypto::CryptoProvider;
use shroud_metadata::MetadataAccess;
use shroud_protocol::NetworkProvider;
use shroud_transfer::{delete_file, Download, FileMeta, TransferContext, Upload};
use shroud_types::FileHandle;
use tracing::info;

use crate::account::AccountSystem;
use crate::config::ClientConfig;
use crate::error::SdkResult;
use crate::hooks::AccountIndexHooks;

/// Entry point for applications: metadata documents, the account index and
/// file transfers sharing one crypto provider and one network provider.
pub struct Client {
    config: ClientConfig,
    metadata: Arc<MetadataAccess>,
    account: Arc<AccountSystem>,
    transfer: TransferContext,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        crypto: Arc<dyn CryptoProvider>,
        net: Arc<dyn NetworkProvider>,
    ) -> Self {
        let metadata = Arc::new(MetadataAccess::new(
            config.metadata.clone(),
            crypto.clone(),
            net.clone(),
        ));
        let account = Arc::new(AccountSystem::new(metadata.clone()));
        let transfer = TransferContext::new(config.transfer.clone(), crypto, net);
        Self {
            config,
            metadata,
            account,
            transfer,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metadata(&self) -> &Arc<MetadataAccess> {
        &self.metadata
    }

    pub fn account(&self) -> &Arc<AccountSystem> {
        &self.account
    }

    // ---- Transfers ----

    /// Prepare an upload of `name` into the folder `dir`. The account index
    /// records it when the upload starts and marks it finished at the end.
    pub async fn upload(&self, name: &str, dir: &str, meta: FileMeta) -> SdkResult<Upload> {
        let hooks = Arc::new(AccountIndexHooks::new(self.account.clone(), false));
        let ctx = self.transfer.clone().with_hooks(hooks);
        Ok(Upload::new(ctx, name, dir, meta).await?)
    }

    pub fn download(&self, handle: FileHandle) -> Download {
        Download::new(self.transfer.clone(), handle)
    }

    /// Delete a file from the storage node and from the account index.
    pub async fn delete_file(&self, handle: &FileHandle) -> SdkResult<()> {
        delete_file(&self.transfer, handle).await?;
        let location = self.account.file_location_by_handle(handle).await?;
        self.account.remove_file(&location).await?;
        info!(file = %handle.location, "file deleted");
        Ok(())
    }
}
