use std::sync::{Arc, Mutex};

use bytes::Bytes;
use shroud_protocol::{endpoints, DownloadResponse, FileIdRequest, RequestBody};
use shroud_queue::{CommitError, OrderedQueue};
use shroud_types::FileHandle;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::context::{fatal, TransferContext};
use crate::error::{TransferError, TransferResult};
use crate::events::TransferEvent;
use crate::meta::FileMeta;
use crate::state::{Control, TransferState};

struct DownloadShared {
    ctx: TransferContext,
    handle: FileHandle,
    control: Control,
    net_queue: OrderedQueue<TransferResult<Bytes>>,
    decrypt_queue: OrderedQueue<TransferResult<Bytes>>,
    meta: Mutex<Option<FileMeta>>,
}

/// One file being downloaded.
///
/// Parts are fetched with ranged requests, split into blocks, decrypted
/// concurrently and delivered in order on the channel returned by
/// [`Download::start`]. The stream ending does not mean success: call
/// [`Download::finish`] for the outcome.
#[derive(Clone)]
pub struct Download {
    shared: Arc<DownloadShared>,
}

impl Download {
    pub fn new(ctx: TransferContext, handle: FileHandle) -> Self {
        let queue = ctx.config.queue;
        Self {
            shared: Arc::new(DownloadShared {
                handle,
                control: Control::new(),
                net_queue: OrderedQueue::new(queue.download_net),
                decrypt_queue: OrderedQueue::new(queue.decrypt),
                meta: Mutex::new(None),
                ctx,
            }),
        }
    }

    pub fn handle(&self) -> &FileHandle {
        &self.shared.handle
    }

    /// File attributes, once they have been fetched.
    pub fn metadata(&self) -> Option<FileMeta> {
        self.shared.meta.lock().expect("lock poisoned").clone()
    }

    /// Start the download and return the stream of plaintext blocks.
    pub fn start(&self) -> TransferResult<BlockStream> {
        self.shared.control.begin()?;
        let (tx, rx) = mpsc::channel(self.shared.ctx.config.queue.decrypt.max(1));
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = shared.run(tx).await;
            if let Err(err) = &result {
                warn!(file = %shared.handle.location, error = %err, "download stopped");
            }
            shared.control.complete(&result);
            if result.is_err() {
                shared.net_queue.cancel();
                shared.decrypt_queue.cancel();
            }
        });
        Ok(BlockStream {
            state: self.shared.control.watch_state(),
            shared: self.shared.clone(),
            rx,
        })
    }

    pub async fn finish(&self) -> TransferResult<()> {
        self.shared.control.finished().await
    }

    pub fn pause(&self) {
        self.shared.control.pause();
    }

    pub fn resume(&self) {
        self.shared.control.resume();
    }

    pub fn cancel(&self) {
        if self.shared.control.cancel() {
            info!(file = %self.shared.handle.location, "download cancelled");
        }
        self.shared.net_queue.cancel();
        self.shared.decrypt_queue.cancel();
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

fn is_stopped(state: &TransferState) -> bool {
    matches!(state, TransferState::Cancelled | TransferState::Errored(_))
}

/// Plaintext blocks of a [`Download`], in file order.
///
/// Yields nothing more once the download is cancelled or has failed, even
/// if decrypted blocks are still buffered.
pub struct BlockStream {
    rx: mpsc::Receiver<Bytes>,
    state: watch::Receiver<TransferState>,
    // Keeps the state sender alive for as long as the stream is read.
    shared: Arc<DownloadShared>,
}

impl BlockStream {
    pub async fn recv(&mut self) -> Option<Bytes> {
        if is_stopped(&self.state.borrow()) {
            self.rx.close();
            return None;
        }
        tokio::select! {
            biased;
            _ = self.state.wait_for(is_stopped) => {
                self.rx.close();
                None
            }
            block = self.rx.recv() => block.filter(|_| !self.shared.control.is_stopped()),
        }
    }
}

impl DownloadShared {
    async fn run(self: &Arc<Self>, tx: mpsc::Sender<Bytes>) -> TransferResult<()> {
        let ctx = &self.ctx;
        let layout = ctx.config.layout;

        ctx.ping().await?;
        ctx.hooks.before_download(&self.handle).await?;
        self.control.check()?;

        let request = FileIdRequest {
            file_id: self.handle.location.to_hex(),
        };
        let resolved: DownloadResponse = ctx
            .net
            .post(&ctx.url(endpoints::DOWNLOAD), &[], RequestBody::json(&request)?)
            .await?
            .error_for_status()?
            .json()?;
        let base = resolved.file_download_url;

        let encrypted_meta = ctx
            .net
            .get(&format!("{base}{}", endpoints::DOWNLOAD_METADATA_SUFFIX), &[])
            .await?
            .error_for_status()?;
        let meta = FileMeta::from_json(
            &ctx.crypto
                .decrypt(&self.handle.key, &encrypted_meta.data)
                .await?,
        )?;
        *self.meta.lock().expect("lock poisoned") = Some(meta.clone());
        self.control.emit(TransferEvent::Metadata(meta.clone()));
        self.control.check()?;

        let size = meta.size;
        let blocks = layout.number_of_blocks(size);
        let parts = layout.number_of_parts(size);
        self.control.emit(TransferEvent::Started { blocks, parts });
        self.control.run();
        info!(file = %self.handle.location, size, blocks, parts, "download started");

        let file_url = format!("{base}{}", endpoints::DOWNLOAD_FILE_SUFFIX);
        for index in 0..parts {
            self.control.wait_unpaused().await;
            self.control.check()?;
            self.control.emit(TransferEvent::PartStarted { index });

            let worker = {
                let shared = self.clone();
                let file_url = file_url.clone();
                move |index| async move { shared.fetch_part(&file_url, size, index).await }
            };
            let committer = {
                let shared = self.clone();
                let tx = tx.clone();
                move |part, index| async move {
                    shared
                        .split_part(part, index, size, tx)
                        .await
                        .map_err(fatal)
                }
            };
            self.net_queue.add(index, worker, committer).await?;
        }
        drop(tx);
        self.net_queue.close();
        self.net_queue.wait_for_close().await?;
        self.decrypt_queue.close();
        self.decrypt_queue.wait_for_close().await?;

        ctx.hooks.after_download(&self.handle, &meta).await?;
        info!(file = %self.handle.location, size, "download finished");
        Ok(())
    }

    async fn fetch_part(&self, file_url: &str, size: u64, index: u64) -> TransferResult<Bytes> {
        self.control.wait_unpaused().await;
        self.control.check()?;
        let (start, end) = self.ctx.config.layout.part_range(size, index);
        let range = [("Range".to_string(), format!("bytes={}-{}", start, end - 1))];
        debug!(part = index, start, end, "fetching part");
        let res = self.ctx.net.get(file_url, &range).await?.error_for_status()?;
        let expected = end - start;
        if res.data.len() as u64 != expected {
            return Err(TransferError::PartLength {
                index,
                expected,
                actual: res.data.len() as u64,
            });
        }
        Ok(res.data)
    }

    /// Queue every block of a fetched part for decryption.
    async fn split_part(
        self: &Arc<Self>,
        part: TransferResult<Bytes>,
        part_index: u64,
        size: u64,
        tx: mpsc::Sender<Bytes>,
    ) -> TransferResult<()> {
        let part = part?;
        let layout = self.ctx.config.layout;
        let blocks = layout.number_of_blocks(size);
        let block_size_on_fs = layout.block_size_on_fs() as usize;

        let mut offset = 0;
        let mut index = part_index * layout.blocks_per_part;
        while offset < part.len() {
            let end = (offset + block_size_on_fs).min(part.len());
            let block = part.slice(offset..end);
            offset = end;

            let worker = {
                let shared = self.clone();
                move |index| async move { shared.decrypt_block(index, block).await }
            };
            let committer = {
                let shared = self.clone();
                let tx = tx.clone();
                move |plain: TransferResult<Bytes>, index: u64| async move {
                    let plain = plain.map_err(fatal)?;
                    shared.control.check().map_err(fatal)?;
                    tx.send(plain)
                        .await
                        .map_err(|_| fatal(TransferError::OutputClosed))?;
                    shared.control.emit(TransferEvent::BlockFinished { index });
                    shared.control.emit(TransferEvent::Progress {
                        fraction: (index + 1) as f64 / blocks as f64,
                    });
                    Ok::<(), CommitError>(())
                }
            };
            self.decrypt_queue.add(index, worker, committer).await?;
            index += 1;
        }
        self.control
            .emit(TransferEvent::PartFinished { index: part_index });
        Ok(())
    }

    async fn decrypt_block(&self, index: u64, block: Bytes) -> TransferResult<Bytes> {
        self.control.wait_unpaused().await;
        self.control.check()?;
        self.control.emit(TransferEvent::BlockStarted { index });
        let plain = self.ctx.crypto.decrypt(&self.handle.key, &block).await?;
        Ok(Bytes::from(plain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::delete_file;
    use crate::test_support::{collect, context, payload, upload_bytes};
    use shroud_protocol::MemoryRemote;
    use shroud_types::{Location, CONTENT_KEY_SIZE};
    use std::time::Duration;

    #[tokio::test]
    async fn round_trips_at_block_and_part_edges() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        for size in [0usize, 1, 16, 64, 65, 150] {
            let data = payload(size);
            let handle = upload_bytes(&ctx, data.clone()).await.unwrap();
            let download = Download::new(ctx.clone(), handle);
            let rx = download.start().unwrap();
            let received = collect(rx).await;
            download.finish().await.unwrap();
            assert_eq!(received, data, "size {size}");
            assert_eq!(download.metadata().unwrap().size, size as u64);
        }
    }

    #[tokio::test]
    async fn parts_are_fetched_by_range() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        let handle = upload_bytes(&ctx, payload(150)).await.unwrap();
        let download = Download::new(ctx.clone(), handle);
        let rx = download.start().unwrap();
        collect(rx).await;
        download.finish().await.unwrap();
        assert_eq!(
            remote.count_requests(endpoints::DOWNLOAD_FILE_SUFFIX) as u64,
            ctx.config.layout.number_of_parts(150)
        );
        assert_eq!(remote.count_requests(endpoints::DOWNLOAD_METADATA_SUFFIX), 1);
    }

    #[tokio::test]
    async fn metadata_event_comes_first() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        let handle = upload_bytes(&ctx, payload(20)).await.unwrap();
        let download = Download::new(ctx, handle);
        let mut events = download.subscribe();
        let rx = download.start().unwrap();
        collect(rx).await;
        download.finish().await.unwrap();
        match events.try_recv().unwrap() {
            TransferEvent::Metadata(meta) => assert_eq!(meta.size, 20),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_key_fails() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        let handle = upload_bytes(&ctx, payload(20)).await.unwrap();
        let forged = FileHandle::new(handle.location, [9; CONTENT_KEY_SIZE]);
        let download = Download::new(ctx, forged);
        let rx = download.start().unwrap();
        assert!(collect(rx).await.is_empty());
        assert!(matches!(
            download.finish().await,
            Err(TransferError::Failed(_))
        ));
        assert!(download.metadata().is_none());
    }

    #[tokio::test]
    async fn unknown_file_fails() {
        let remote = Arc::new(MemoryRemote::new());
        let handle = FileHandle::new(Location::from([3; 32]), [4; CONTENT_KEY_SIZE]);
        let download = Download::new(context(&remote), handle);
        let rx = download.start().unwrap();
        assert!(collect(rx).await.is_empty());
        assert!(download.finish().await.is_err());
    }

    #[tokio::test]
    async fn cancel_ends_the_stream() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        let handle = upload_bytes(&ctx, payload(400)).await.unwrap();
        remote.set_latency(Duration::from_millis(10));
        let download = Download::new(ctx, handle);
        let mut rx = download.start().unwrap();
        assert!(rx.recv().await.is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        download.cancel();
        let mut after_cancel = 0;
        while rx.recv().await.is_some() {
            after_cancel += 1;
        }
        assert_eq!(after_cancel, 0);
        assert!(matches!(
            download.finish().await,
            Err(TransferError::Cancelled)
        ));
        assert_eq!(download.state(), TransferState::Cancelled);
    }

    #[tokio::test]
    async fn dropped_output_errors() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        let handle = upload_bytes(&ctx, payload(400)).await.unwrap();
        let download = Download::new(ctx, handle);
        drop(download.start().unwrap());
        assert!(download.finish().await.is_err());
    }

    #[tokio::test]
    async fn deleted_files_are_gone() {
        let remote = Arc::new(MemoryRemote::new());
        let ctx = context(&remote);
        let handle = upload_bytes(&ctx, payload(20)).await.unwrap();
        delete_file(&ctx, &handle).await.unwrap();
        assert_eq!(remote.file_count(), 0);

        let download = Download::new(ctx.clone(), handle.clone());
        collect(download.start().unwrap()).await;
        assert!(download.finish().await.is_err());

        assert!(matches!(
            delete_file(&ctx, &handle).await,
            Err(TransferError::Deletion { status: 404 })
        ));
    }
}
