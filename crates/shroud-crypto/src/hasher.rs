use sha2::{Digest, Sha256};
use shroud_types::VertexId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a vertex id can never collide with a hash computed for
/// another purpose over the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for metadata DAG vertices.
    pub const VERTEX: Self = Self {
        domain: "shroud-vertex-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash_parts(&[data])
    }

    /// Hash the concatenation of several byte slices with domain separation.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }

    /// Hash into a vertex identifier.
    pub fn hash_id(&self, parts: &[&[u8]]) -> VertexId {
        VertexId::from_hash(self.hash_parts(parts))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Plain SHA-256.
///
/// Used to turn a derived private key into the symmetric key of its document,
/// and as the hash function of the signed DAG digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            ContentHasher::VERTEX.hash(b"hello"),
            ContentHasher::VERTEX.hash(b"hello")
        );
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        assert_ne!(
            ContentHasher::VERTEX.hash(b"same"),
            ContentHasher::new("shroud-other-v1").hash(b"same")
        );
    }

    #[test]
    fn parts_hash_like_concatenation() {
        let joined = ContentHasher::VERTEX.hash(b"abcdef");
        let parts = ContentHasher::VERTEX.hash_parts(&[b"abc", b"def"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
