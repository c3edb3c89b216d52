//! Authenticated symmetric encryption with ChaCha20-Poly1305.
//!
//! Output layout is `nonce (12 bytes) || ciphertext || tag (16 bytes)`, so
//! every call adds exactly [`ENCRYPTION_OVERHEAD`] bytes. Transfer layouts
//! rely on that constant to compute on-disk block sizes.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Size of a ChaCha20-Poly1305 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of a ChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Bytes added to every plaintext by [`encrypt`].
pub const ENCRYPTION_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

fn cipher(key: &[u8]) -> CryptoResult<ChaCha20Poly1305> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
}

/// Encrypt `plaintext` under a fresh random nonce.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data produced by [`encrypt`].
pub fn decrypt(key: &[u8], data: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = cipher(key)?;
    if data.len() < ENCRYPTION_OVERHEAD {
        return Err(CryptoError::CiphertextTooShort(data.len()));
    }
    let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
    cipher
        .decrypt(nonce, &data[NONCE_SIZE..])
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt() {
        let key = [9u8; KEY_SIZE];
        let ct = encrypt(&key, b"block contents").unwrap();
        assert_eq!(ct.len(), b"block contents".len() + ENCRYPTION_OVERHEAD);
        assert_eq!(decrypt(&key, &ct).unwrap(), b"block contents");
    }

    #[test]
    fn empty_plaintext_has_fixed_overhead() {
        let ct = encrypt(&[1; KEY_SIZE], b"").unwrap();
        assert_eq!(ct.len(), ENCRYPTION_OVERHEAD);
        assert!(decrypt(&[1; KEY_SIZE], &ct).unwrap().is_empty());
    }

    #[test]
    fn nonces_are_fresh() {
        let key = [2u8; KEY_SIZE];
        assert_ne!(encrypt(&key, b"x").unwrap(), encrypt(&key, b"x").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let ct = encrypt(&[1; KEY_SIZE], b"secret").unwrap();
        assert_eq!(decrypt(&[2; KEY_SIZE], &ct), Err(CryptoError::Decryption));
    }

    #[test]
    fn tampered_data_fails() {
        let key = [4u8; KEY_SIZE];
        let mut ct = encrypt(&key, b"secret").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;
        assert_eq!(decrypt(&key, &ct), Err(CryptoError::Decryption));
    }

    #[test]
    fn short_input_and_bad_key_are_rejected() {
        assert_eq!(
            decrypt(&[0; KEY_SIZE], &[0; 10]),
            Err(CryptoError::CiphertextTooShort(10))
        );
        assert!(matches!(
            encrypt(&[0; 16], b"x"),
            Err(CryptoError::InvalidKeyLength { actual: 16, .. })
        ));
    }
}
