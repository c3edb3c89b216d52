use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use shroud_crypto::LocalCrypto;
use shroud_protocol::MemoryRemote;
use shroud_types::FileHandle;

use crate::config::{QueueSizes, RetryPolicy, TransferConfig};
use crate::context::TransferContext;
use crate::download::BlockStream;
use crate::error::TransferResult;
use crate::layout::BlockLayout;
use crate::meta::FileMeta;
use crate::upload::Upload;

/// Context over `remote` with 16-byte blocks and four blocks per part.
pub(crate) fn context(remote: &Arc<MemoryRemote>) -> TransferContext {
    let config = TransferConfig {
        storage_node: "memory://storage".into(),
        queue: QueueSizes {
            encrypt: 3,
            upload_net: 2,
            download_net: 3,
            decrypt: 4,
        },
        layout: BlockLayout {
            block_size: 16,
            blocks_per_part: 4,
            overhead: 28,
        },
        retry: RetryPolicy {
            first_delay_ms: 1,
            factor: 2,
            max_retries: 3,
        },
    };
    TransferContext::new(config, Arc::new(LocalCrypto::new([7; 32])), remote.clone())
}

pub(crate) fn payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(len as u64).fill_bytes(&mut data);
    data
}

pub(crate) async fn upload_bytes(ctx: &TransferContext, data: Vec<u8>) -> TransferResult<FileHandle> {
    let meta = FileMeta::new(data.len() as u64, "application/octet-stream");
    let upload = Upload::new(ctx.clone(), "blob", "/", meta).await?;
    upload.start(std::io::Cursor::new(data))?;
    upload.finish().await?;
    Ok(upload.handle().clone())
}

pub(crate) async fn collect(mut rx: BlockStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = rx.recv().await {
        out.extend_from_slice(&chunk);
    }
    out
}
