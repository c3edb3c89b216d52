//! Cryptographic primitives for Shroud.
//!
//! Provides domain-separated BLAKE3 hashing, SHA-256, Ed25519 signing and
//! verification, ChaCha20-Poly1305 content encryption, and the
//! [`CryptoProvider`] capability consumed by the metadata and transfer layers.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod cipher;
pub mod error;
pub mod hasher;
pub mod local;
pub mod provider;
pub mod signer;

pub use cipher::{ENCRYPTION_OVERHEAD, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use hasher::{sha256, ContentHasher};
pub use local::LocalCrypto;
pub use provider::CryptoProvider;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
