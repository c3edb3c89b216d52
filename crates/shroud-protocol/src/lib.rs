//! Wire protocol for Shroud.
//!
//! Defines the HTTP endpoints and JSON payloads spoken with the metadata and
//! storage nodes, and the [`NetworkProvider`] capability that carries them.
//! [`HttpNetwork`] is the `reqwest` implementation; [`MemoryRemote`] emulates
//! both nodes in memory for tests and local demos.

pub mod endpoint;
pub mod error;
pub mod http;
pub mod memory;
pub mod message;
pub mod transport;

pub use endpoint::endpoints;
pub use error::{ProtocolError, ProtocolResult};
pub use http::HttpNetwork;
pub use memory::MemoryRemote;
pub use message::{
    b64_decode, b64_encode, init_upload_form, upload_part_form, DownloadResponse, FileIdRequest,
    MetadataAddRequest, MetadataAddResponse, MetadataDeleteRequest, MetadataGetRequest,
    MetadataGetResponse, MetadataLookup, PublicKeyQuery, PublicMetadataGetRequest,
    UploadStatusRequest, KEY_NOT_FOUND,
};
pub use transport::{FormField, FormValue, Headers, NetResponse, NetworkProvider, RequestBody};
