use std::sync::Arc;

use shroud_crypto::CryptoProvider;
use shroud_protocol::endpoint::url;
use shroud_protocol::{FileIdRequest, NetworkProvider, RequestBody};
use shroud_protocol::endpoints;
use shroud_queue::CommitError;
use shroud_types::FileHandle;
use tracing::info;

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::hooks::{NoOpHooks, TransferHooks};

/// Everything a transfer needs from its surroundings.
#[derive(Clone)]
pub struct TransferContext {
    pub config: TransferConfig,
    pub crypto: Arc<dyn CryptoProvider>,
    pub net: Arc<dyn NetworkProvider>,
    pub hooks: Arc<dyn TransferHooks>,
}

impl TransferContext {
    pub fn new(
        config: TransferConfig,
        crypto: Arc<dyn CryptoProvider>,
        net: Arc<dyn NetworkProvider>,
    ) -> Self {
        Self {
            config,
            crypto,
            net,
            hooks: Arc::new(NoOpHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn TransferHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        url(&self.config.storage_node, path)
    }

    /// Fail fast when the storage node does not answer.
    pub(crate) async fn ping(&self) -> TransferResult<()> {
        let res = self
            .net
            .get(&self.config.storage_node, &[])
            .await
            .map_err(|e| TransferError::Unreachable(e.to_string()))?;
        if !res.ok() {
            return Err(TransferError::Unreachable(format!("status {}", res.status)));
        }
        Ok(())
    }
}

/// Remove an uploaded file from the storage node.
pub async fn delete_file(ctx: &TransferContext, handle: &FileHandle) -> TransferResult<()> {
    let request = FileIdRequest {
        file_id: handle.location.to_hex(),
    };
    let res = ctx
        .net
        .post(&ctx.url(endpoints::DELETE), &[], RequestBody::json(&request)?)
        .await?;
    if !res.ok() {
        return Err(TransferError::Deletion { status: res.status });
    }
    info!(file = %handle.location, "deleted file");
    Ok(())
}

/// Turn a pipeline error into a queue-fatal committer error.
pub(crate) fn fatal(err: TransferError) -> CommitError {
    Box::new(err)
}
