use shroud_crypto::{sha256, CryptoProvider};
use shroud_protocol::b64_encode;

use crate::error::MetadataResult;

/// Key material addressing one metadata document.
///
/// The public key names the document on the metadata node, the private key
/// signs writes, and the symmetric key encrypts every change-set. Documents
/// opened by public key alone are read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentKeys {
    private: Option<Vec<u8>>,
    public: Vec<u8>,
    encrypt_key: Vec<u8>,
}

impl DocumentKeys {
    /// Keys derived from the account seed and an already cleaned path.
    pub async fn for_path(crypto: &dyn CryptoProvider, path: &str) -> MetadataResult<Self> {
        let private = crypto.derive(None, path).await?;
        Self::from_private(crypto, &private, None).await
    }

    /// Keys for an explicit private key. Without `encrypt_key` the document
    /// is encrypted with SHA-256 of the private key.
    pub async fn from_private(
        crypto: &dyn CryptoProvider,
        private: &[u8],
        encrypt_key: Option<&[u8]>,
    ) -> MetadataResult<Self> {
        let public = crypto.public_key(private).await?;
        let encrypt_key = match encrypt_key {
            Some(key) => key.to_vec(),
            None => sha256(private).to_vec(),
        };
        Ok(Self {
            private: Some(private.to_vec()),
            public,
            encrypt_key,
        })
    }

    /// Read-only keys for a shared document.
    pub fn from_public(public: &[u8], encrypt_key: &[u8]) -> Self {
        Self {
            private: None,
            public: public.to_vec(),
            encrypt_key: encrypt_key.to_vec(),
        }
    }

    pub fn private(&self) -> Option<&[u8]> {
        self.private.as_deref()
    }

    pub fn public(&self) -> &[u8] {
        &self.public
    }

    pub fn encrypt_key(&self) -> &[u8] {
        &self.encrypt_key
    }

    /// Base64 public key, as sent in `metadataV2Key`.
    pub fn store_key(&self) -> String {
        b64_encode(&self.public)
    }
}

impl std::fmt::Debug for DocumentKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentKeys")
            .field("public", &self.store_key())
            .field("writable", &self.private.is_some())
            .finish_non_exhaustive()
    }
}
