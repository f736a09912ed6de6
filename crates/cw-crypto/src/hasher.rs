use cw_types::ContentHash;
use sha1::{Digest, Sha1};

/// Streaming SHA-1 content hasher.
///
/// Produces the same [`ContentHash`] as [`ContentHash::from_bytes`] but lets
/// callers feed a payload in pieces (for example, fragment by fragment).
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha1,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Consume the hasher and return the content hash.
    pub fn finalize(self) -> ContentHash {
        let digest = self.inner.finalize();
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&digest);
        ContentHash::from_hash(hash)
    }

    /// One-shot hash of a byte slice.
    pub fn hash(data: &[u8]) -> ContentHash {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Verify that data produces the expected content hash.
    pub fn verify(data: &[u8], expected: &ContentHash) -> bool {
        Self::hash(data) == *expected
    }
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(ContentHasher::hash(b"hello"), ContentHasher::hash(b"hello"));
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello ").update(b"world");
        assert_eq!(hasher.finalize(), ContentHash::from_bytes(b"hello world"));
    }

    #[test]
    fn verify_correct_data() {
        let id = ContentHasher::hash(b"test data");
        assert!(ContentHasher::verify(b"test data", &id));
    }

    #[test]
    fn verify_incorrect_data() {
        let id = ContentHasher::hash(b"original");
        assert!(!ContentHasher::verify(b"tampered", &id));
    }
}
