use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use cw_crypto::ContentHasher;
use cw_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// In-memory, `HashMap`-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock` and
/// cloned on read.
#[derive(Default)]
pub struct InMemoryObjectStore {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|blob| blob.len() as u64)
            .sum()
    }

    /// Sorted list of every stored hash.
    pub fn all_hashes(&self) -> Vec<ContentHash> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut hashes: Vec<ContentHash> = map.keys().copied().collect();
        hashes.sort();
        hashes
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let Some(blob) = map.get(hash) else {
            return Ok(None);
        };
        let computed = ContentHasher::hash(blob);
        if computed != *hash {
            return Err(StoreError::HashMismatch {
                expected: *hash,
                computed,
            });
        }
        Ok(Some(blob.clone()))
    }

    fn write(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHasher::hash(data);
        let mut map = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(hash).or_insert_with(|| data.to_vec());
        Ok(hash)
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(hash))
    }

    fn delete(&self, hash: &ContentHash) -> StoreResult<bool> {
        let mut map = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.remove(hash).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read() {
        let store = InMemoryObjectStore::new();
        let hash = store.write(b"hello world").unwrap();
        assert_eq!(hash, ContentHash::from_bytes(b"hello world"));
        assert_eq!(store.read(&hash).unwrap().unwrap(), b"hello world");
    }

    #[test]
    fn identical_bytes_are_stored_once() {
        let store = InMemoryObjectStore::new();
        let a = store.write(b"same").unwrap();
        let b = store.write(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn read_missing_returns_none() {
        let store = InMemoryObjectStore::new();
        assert!(store.read(&ContentHash::from_bytes(b"missing")).unwrap().is_none());
    }

    #[test]
    fn delete_then_exists() {
        let store = InMemoryObjectStore::new();
        let hash = store.write(b"to-delete").unwrap();
        assert!(store.exists(&hash).unwrap());
        assert!(store.delete(&hash).unwrap());
        assert!(!store.exists(&hash).unwrap());
        assert!(!store.delete(&hash).unwrap());
    }

    #[test]
    fn read_batch_preserves_order() {
        let store = InMemoryObjectStore::new();
        let a = store.write(b"a").unwrap();
        let missing = ContentHash::from_bytes(b"nope");
        let results = store.read_batch(&[a, missing]).unwrap();
        assert_eq!(results[0].as_deref(), Some(&b"a"[..]));
        assert!(results[1].is_none());
    }

    #[test]
    fn totals_and_listing() {
        let store = InMemoryObjectStore::new();
        assert!(store.is_empty());
        store.write(b"12345").unwrap();
        store.write(b"123456789").unwrap();
        assert_eq!(store.total_bytes(), 14);
        let hashes = store.all_hashes();
        assert_eq!(hashes.len(), 2);
        assert!(hashes[0] < hashes[1]);
    }
}
