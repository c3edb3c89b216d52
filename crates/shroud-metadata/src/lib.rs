//! Encrypted metadata documents for Shroud.
//!
//! [`MetadataAccess`] is a key-value store of mergeable documents kept on an
//! untrusted metadata node. A document's key pair is derived from the account
//! seed and a logical path (or supplied explicitly for shared documents); its
//! value is the replay of a DAG of encrypted, signed change-sets.
//!
//! # Key Types
//!
//! - [`MetadataAccess`]: get, change, delete and cache control per path
//! - [`DocumentKeys`]: public, private and symmetric key of one document
//! - [`MetadataStore`]: per-key DAGs and cached documents
//! - [`IndexEntry`]: one key recorded in the owner's metadata index

pub mod access;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod keys;
pub mod store;

pub use access::MetadataAccess;
pub use cache::CacheEntry;
pub use config::MetadataConfig;
pub use error::{MetadataError, MetadataResult};
pub use index::{index_entries, IndexEntry, METADATA_INDEX_PATH};
pub use keys::DocumentKeys;
pub use store::MetadataStore;
