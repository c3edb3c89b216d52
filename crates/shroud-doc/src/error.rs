use thiserror::Error;

use shroud_types::TypeError;

/// Errors produced by document operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocError {
    #[error("malformed change-set: {0}")]
    Malformed(String),

    #[error("malformed change record: {0}")]
    InvalidRecord(String),

    #[error("document cannot be read as the requested type: {0}")]
    Type(String),
}

impl From<TypeError> for DocError {
    fn from(e: TypeError) -> Self {
        DocError::Malformed(e.to_string())
    }
}

pub type DocResult<T> = Result<T, DocError>;
