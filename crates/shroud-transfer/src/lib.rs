//! Chunked, encrypted transfers against a Shroud storage node.
//!
//! A file is cut into fixed-size blocks, each sealed with the file's content
//! key, and blocks are grouped into parts that travel over the network.
//! Both directions chain two [`shroud_queue::OrderedQueue`]s so that crypto
//! and network work overlap while parts and blocks still complete in order.
//!
//! # Key Types
//!
//! - [`Upload`]: encrypt-then-post pipeline producing a [`shroud_types::FileHandle`]
//! - [`Download`]: ranged-fetch-then-decrypt pipeline streaming plaintext blocks
//! - [`BlockLayout`]: block and part arithmetic shared by both directions
//! - [`TransferHooks`]: callbacks the SDK uses to keep its file index current

pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod events;
pub mod hooks;
pub mod layout;
pub mod meta;
pub mod retry;
pub mod state;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use config::{QueueSizes, RetryPolicy, TransferConfig};
pub use context::{delete_file, TransferContext};
pub use download::{BlockStream, Download};
pub use error::{TransferError, TransferResult};
pub use events::{TransferEvent, TransferTimings};
pub use hooks::{NoOpHooks, TransferHooks, UploadInfo};
pub use layout::BlockLayout;
pub use meta::FileMeta;
pub use state::TransferState;
pub use upload::Upload;
