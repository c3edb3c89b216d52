use std::sync::{Arc, Mutex};

use shroud_protocol::{
    endpoints, init_upload_form, upload_part_form, RequestBody, UploadStatusRequest,
};
use shroud_queue::OrderedQueue;
use shroud_types::{FileHandle, CONTENT_KEY_SIZE, LOCATION_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::context::{fatal, TransferContext};
use crate::error::{TransferError, TransferResult};
use crate::events::TransferEvent;
use crate::hooks::UploadInfo;
use crate::meta::FileMeta;
use crate::retry::retry;
use crate::state::{Control, TransferState};

struct UploadShared {
    ctx: TransferContext,
    info: UploadInfo,
    control: Control,
    encrypt_queue: OrderedQueue<TransferResult<Vec<u8>>>,
    net_queue: OrderedQueue<TransferResult<()>>,
}

/// One file being uploaded.
///
/// The file is cut into blocks that are encrypted concurrently with the
/// content key, reassembled in order into parts, and each part is posted
/// with retry. The content key and location are fresh random values, so
/// the [`FileHandle`] is known before any byte is sent.
#[derive(Clone)]
pub struct Upload {
    shared: Arc<UploadShared>,
}

impl Upload {
    pub async fn new(
        ctx: TransferContext,
        name: impl Into<String>,
        path: impl Into<String>,
        meta: FileMeta,
    ) -> TransferResult<Self> {
        let mut handle = ctx.crypto.random_bytes(LOCATION_SIZE).await?;
        let key = ctx.crypto.generate_symmetric_key().await?;
        if key.len() != CONTENT_KEY_SIZE {
            return Err(shroud_types::TypeError::InvalidByteLength {
                expected: CONTENT_KEY_SIZE,
                actual: key.len(),
            }
            .into());
        }
        handle.extend_from_slice(&key);
        let handle = FileHandle::from_bytes(&handle)?;

        let queue = ctx.config.queue;
        Ok(Self {
            shared: Arc::new(UploadShared {
                info: UploadInfo {
                    handle,
                    name: name.into(),
                    path: path.into(),
                    meta,
                },
                control: Control::new(),
                encrypt_queue: OrderedQueue::new(queue.encrypt),
                net_queue: OrderedQueue::new(queue.upload_net),
                ctx,
            }),
        })
    }

    pub fn handle(&self) -> &FileHandle {
        &self.shared.info.handle
    }

    pub fn info(&self) -> &UploadInfo {
        &self.shared.info
    }

    /// Bytes the storage node will hold for this file.
    pub fn size_on_fs(&self) -> u64 {
        self.shared.ctx.config.layout.size_on_fs(self.shared.info.meta.size)
    }

    /// Start uploading `reader`, which must yield exactly `meta.size` bytes.
    pub fn start<R>(&self, reader: R) -> TransferResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.shared.control.begin()?;
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = shared.run(reader).await;
            if let Err(err) = &result {
                warn!(file = %shared.info.handle.location, error = %err, "upload stopped");
            }
            shared.control.complete(&result);
            if result.is_err() {
                shared.encrypt_queue.cancel();
                shared.net_queue.cancel();
            }
        });
        Ok(())
    }

    /// Resolve when the upload finished; fail if it errored or was cancelled.
    pub async fn finish(&self) -> TransferResult<()> {
        self.shared.control.finished().await
    }

    /// Stop scheduling new blocks and parts. Work in flight completes.
    pub fn pause(&self) {
        self.shared.control.pause();
    }

    pub fn resume(&self) {
        self.shared.control.resume();
    }

    pub fn cancel(&self) {
        if self.shared.control.cancel() {
            info!(file = %self.shared.info.handle.location, "upload cancelled");
        }
        self.shared.encrypt_queue.cancel();
        self.shared.net_queue.cancel();
    }

    pub fn state(&self) -> TransferState {
        self.shared.control.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<TransferState> {
        self.shared.control.watch_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.shared.control.subscribe()
    }
}

impl UploadShared {
    fn file_id(&self) -> String {
        self.info.handle.location.to_hex()
    }

    async fn run<R>(self: &Arc<Self>, mut reader: R) -> TransferResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let ctx = &self.ctx;
        let layout = ctx.config.layout;
        let size = self.info.meta.size;
        let blocks = layout.number_of_blocks(size);
        let parts = layout.number_of_parts(size);

        ctx.ping().await?;
        self.control.check()?;
        self.control.emit(TransferEvent::Metadata(self.info.meta.clone()));
        ctx.hooks.before_upload(&self.info).await?;

        let encrypted_meta = ctx
            .crypto
            .encrypt(&self.info.handle.key, &self.info.meta.to_json()?)
            .await?;
        let form = init_upload_form(&self.file_id(), layout.size_on_fs(size), encrypted_meta);
        ctx.net
            .post(&ctx.url(endpoints::INIT_UPLOAD), &[], RequestBody::Form(form))
            .await?
            .error_for_status()?;
        self.control.check()?;

        self.control.emit(TransferEvent::Started { blocks, parts });
        self.control.run();
        info!(file = %self.info.handle.location, size, blocks, parts, "upload started");

        let assembly = Arc::new(Mutex::new(Vec::new()));
        for index in 0..blocks {
            self.control.wait_unpaused().await;
            self.control.check()?;
            let mut block = vec![0u8; layout.block_len(size, index) as usize];
            reader.read_exact(&mut block).await?;

            let worker = {
                let shared = self.clone();
                move |index| async move { shared.encrypt_block(index, block).await }
            };
            let committer = {
                let shared = self.clone();
                let assembly = assembly.clone();
                move |encrypted, index| async move {
                    shared
                        .commit_block(encrypted, index, assembly)
                        .await
                        .map_err(fatal)
                }
            };
            self.encrypt_queue.add(index, worker, committer).await?;
        }
        self.encrypt_queue.close();
        self.encrypt_queue.wait_for_close().await?;
        self.net_queue.close();
        self.net_queue.wait_for_close().await?;

        let status = UploadStatusRequest {
            file_handle: self.file_id(),
        };
        ctx.net
            .post(&ctx.url(endpoints::UPLOAD_STATUS), &[], RequestBody::json(&status)?)
            .await?
            .error_for_status()?;
        ctx.hooks.after_upload(&self.info).await?;
        info!(file = %self.info.handle.location, size, "upload finished");
        Ok(())
    }

    async fn encrypt_block(&self, index: u64, block: Vec<u8>) -> TransferResult<Vec<u8>> {
        self.control.wait_unpaused().await;
        self.control.check()?;
        self.control.emit(TransferEvent::BlockStarted { index });
        Ok(self.ctx.crypto.encrypt(&self.info.handle.key, &block).await?)
    }

    /// Append an encrypted block to the current part; hand the part to the
    /// network queue once its last block arrives.
    async fn commit_block(
        self: &Arc<Self>,
        encrypted: TransferResult<Vec<u8>>,
        index: u64,
        assembly: Arc<Mutex<Vec<u8>>>,
    ) -> TransferResult<()> {
        let encrypted = encrypted?;
        let layout = self.ctx.config.layout;
        let size = self.info.meta.size;
        let blocks = layout.number_of_blocks(size);
        self.control.emit(TransferEvent::BlockFinished { index });
        self.control.emit(TransferEvent::Progress {
            fraction: (index + 1) as f64 / blocks as f64,
        });

        let part = {
            let mut buffer = assembly.lock().expect("lock poisoned");
            buffer.extend_from_slice(&encrypted);
            if !layout.closes_part(size, index) {
                return Ok(());
            }
            std::mem::take(&mut *buffer)
        };
        let part_index = index / layout.blocks_per_part;
        self.control.emit(TransferEvent::PartStarted { index: part_index });

        let worker = {
            let shared = self.clone();
            move |part_index| async move { shared.upload_part(part_index, part).await }
        };
        let committer = {
            let shared = self.clone();
            move |uploaded: TransferResult<()>, part_index| async move {
                if let Err(err) = uploaded {
                    return Err(fatal(err));
                }
                shared
                    .control
                    .emit(TransferEvent::PartFinished { index: part_index });
                Ok(())
            }
        };
        self.net_queue.add(part_index, worker, committer).await?;
        Ok(())
    }

    async fn upload_part(&self, part_index: u64, part: Vec<u8>) -> TransferResult<()> {
        self.control.wait_unpaused().await;
        self.control.check()?;
        let parts = self.ctx.config.layout.number_of_parts(self.info.meta.size);
        let file_id = self.file_id();
        let url = self.ctx.url(endpoints::UPLOAD_PART);
        let (file_id, url, part, net) = (&file_id, &url, &part, &self.ctx.net);
        retry(
            &self.ctx.config.retry,
            move |attempt| {
                let form = upload_part_form(file_id, part_index + 1, parts, part.clone());
                async move {
                    debug!(part = part_index, attempt, "uploading part");
                    net.post(url, &[], RequestBody::Form(form))
                        .await?
                        .error_for_status()
                }
            },
            |_| self.control.is_stopped(),
        )
        .await?;
        Ok(())
    }
}
