//! Foundation types for Shroud.
//!
//! This crate provides the identifiers and small value types shared by every
//! other Shroud crate.
//!
//! # Key Types
//!
//! - [`VertexId`]: Content-addressed identifier of a metadata DAG vertex
//! - [`Location`]: Random 32-byte storage location of an uploaded file
//! - [`FileHandle`]: Location plus content key; everything needed to download
//! - [`path`]: Logical path cleaning and name validation
//! - [`codec`]: Big-endian length-prefixed framing for the binary formats

pub mod codec;
pub mod error;
pub mod handle;
pub mod id;
pub mod path;

pub use error::{PathError, TypeError};
pub use handle::{FileHandle, Location, CONTENT_KEY_SIZE, LOCATION_SIZE};
pub use id::VertexId;
pub use path::{clean_path, validate_directory_path, validate_filename};
