use thiserror::Error;

use crate::signer::SignatureError;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed (wrong key or tampered data)")]
    Decryption,

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
