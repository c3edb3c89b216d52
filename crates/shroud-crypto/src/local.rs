use async_trait::async_trait;
use rand::RngCore;

use crate::cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::provider::CryptoProvider;
use crate::signer::SigningKey;

/// In-process [`CryptoProvider`] holding the account seed in memory.
///
/// Keys are derived as `blake3::keyed_hash(parent, path)` and used directly
/// as Ed25519 secrets.
pub struct LocalCrypto {
    seed: [u8; 32],
}

impl LocalCrypto {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// Provider with a fresh random account seed.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self { seed }
    }

    /// Parse a hex-encoded 32-byte seed.
    pub fn from_hex(seed: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(seed.trim()).map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 0,
        })?;
        let seed: [u8; 32] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: 32,
                    actual: bytes.len(),
                })?;
        Ok(Self { seed })
    }
}

impl std::fmt::Debug for LocalCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalCrypto(<redacted>)")
    }
}

#[async_trait]
impl CryptoProvider for LocalCrypto {
    async fn random_bytes(&self, n: usize) -> CryptoResult<Vec<u8>> {
        let mut out = vec![0u8; n];
        rand::thread_rng().fill_bytes(&mut out);
        Ok(out)
    }

    async fn derive(&self, key: Option<&[u8]>, path: &str) -> CryptoResult<Vec<u8>> {
        let parent: [u8; 32] = match key {
            None => self.seed,
            Some(k) => k.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: k.len(),
            })?,
        };
        Ok(blake3::keyed_hash(&parent, path.as_bytes()).as_bytes().to_vec())
    }

    async fn public_key(&self, private_key: &[u8]) -> CryptoResult<Vec<u8>> {
        let sk = SigningKey::from_slice(private_key)?;
        Ok(sk.verifying_key().as_bytes().to_vec())
    }

    async fn sign(&self, private_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
        let sk = SigningKey::from_slice(private_key)?;
        Ok(sk.sign(message).to_bytes().to_vec())
    }

    async fn generate_symmetric_key(&self) -> CryptoResult<Vec<u8>> {
        self.random_bytes(cipher::KEY_SIZE).await
    }

    async fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        cipher::encrypt(key, plaintext)
    }

    async fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        cipher::decrypt(key, ciphertext)
    }
}
