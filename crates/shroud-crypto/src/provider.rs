use async_trait::async_trait;

use crate::error::CryptoResult;

/// Crypto capability injected into the metadata and transfer layers.
///
/// Keys travel as raw bytes so that alternative providers (hardware-backed,
/// remote signers) can choose their own key formats.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// `n` cryptographically random bytes.
    async fn random_bytes(&self, n: usize) -> CryptoResult<Vec<u8>>;

    /// Deterministically derive a private key from `key` (or the account
    /// seed when `None`) and a logical path.
    async fn derive(&self, key: Option<&[u8]>, path: &str) -> CryptoResult<Vec<u8>>;

    /// Public key matching a private key.
    async fn public_key(&self, private_key: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Sign `message` with a private key.
    async fn sign(&self, private_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Fresh random symmetric key.
    async fn generate_symmetric_key(&self) -> CryptoResult<Vec<u8>>;

    /// Authenticated encryption; adds a fixed number of bytes per call.
    async fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    async fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;
}
