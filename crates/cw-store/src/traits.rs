use cw_types::ContentHash;

use crate::error::StoreResult;

/// Content-addressed blob store.
///
/// Implementations must satisfy these invariants:
/// - Blobs are immutable once written; the same bytes always map to the same
///   hash, so a second write of identical bytes is a no-op.
/// - The store never interprets blob contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read a blob by its hash. Returns `Ok(None)` if it does not exist.
    fn read(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>>;

    /// Write a blob and return its hash.
    fn write(&self, data: &[u8]) -> StoreResult<ContentHash>;

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Delete a blob. Returns `true` if it existed.
    ///
    /// Entries that still reference the hash will fail to read afterwards.
    fn delete(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Read several blobs. Backends may override for fewer round-trips.
    fn read_batch(&self, hashes: &[ContentHash]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        hashes.iter().map(|hash| self.read(hash)).collect()
    }
}
