//! Content-addressed resource database for the Craftworld toolkit.
//!
//! A [`FileData`] maps logical paths to [`FileEntry`] records. Each entry
//! names its bytes by SHA-1 [`ContentHash`](cw_types::ContentHash); the bytes
//! themselves live in an [`ObjectStore`], which deduplicates by hash.
//!
//! # Design Rules
//!
//! 1. Path is the user-facing key; hash is the identity key.
//! 2. Entries sharing a hash read identical bytes.
//! 3. Setters are idempotent: writing the current value never marks the
//!    database dirty.
//! 4. The per-entry derived-data cache is cleared when the hash changes and
//!    is never persisted.
//! 5. One writer per database; callers synchronize shared access.

pub mod database;
pub mod entry;
pub mod error;
pub mod map;
pub mod memory;
pub mod traits;

pub use database::{EntryId, EntryMut, FileData};
pub use entry::{CacheKey, EntryCache, FileEntry, CACHE_SLOTS};
pub use error::{StoreError, StoreResult};
pub use map::MAP_VERSION;
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
