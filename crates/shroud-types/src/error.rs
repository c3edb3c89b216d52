use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidByteLength { expected: usize, actual: usize },

    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after end of input")]
    TrailingBytes(usize),

    #[error("frame of {0} bytes exceeds the u32 length prefix")]
    FrameTooLarge(usize),
}

/// Errors produced when validating logical paths and names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid length of {item:?}: expected between 1 and {max} bytes, got {actual}")]
    InvalidLength {
        item: String,
        max: usize,
        actual: usize,
    },

    #[error("{item:?} includes an illegal character (path separator or NUL)")]
    IllegalCharacter { item: String },
}
