//! High-level SDK for Shroud.
//!
//! [`Client`] wires the metadata layer, the transfer pipelines and the
//! account folder/file index together. This is the main entry point for
//! applications embedding Shroud.

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod records;

pub use account::AccountSystem;
pub use client::Client;
pub use config::ClientConfig;
pub use error::{SdkError, SdkResult};
pub use hooks::AccountIndexHooks;
pub use records::{FileMetadata, FilesIndexEntry, FolderFileEntry, FolderMetadata, FoldersIndexEntry};

// Re-export key types
pub use shroud_crypto::{CryptoProvider, LocalCrypto};
pub use shroud_metadata::{IndexEntry, MetadataAccess, MetadataConfig};
pub use shroud_protocol::{HttpNetwork, MemoryRemote, NetworkProvider};
pub use shroud_transfer::{
    Download, FileMeta, TransferConfig, TransferError, TransferEvent, TransferState, Upload,
};
pub use shroud_types::{FileHandle, Location};
