//! Database entries and their derived-data cache.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use cw_types::{ContentHash, Guid};
use serde::{Deserialize, Serialize};

/// Number of derived-data slots carried by each entry.
pub const CACHE_SLOTS: usize = 4;

/// Consumer-chosen tag selecting a cache slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(usize);

impl CacheKey {
    /// Decoded resource value.
    pub const RESOURCE: Self = Self(0);
    /// Parsed resource header (type, revision, dependencies).
    pub const INFO: Self = Self(1);
    /// Rendered preview image.
    pub const THUMBNAIL: Self = Self(2);
    /// Free for consumer use.
    pub const USER: Self = Self(3);

    /// A key for slot `index`, if it exists.
    pub const fn new(index: usize) -> Option<Self> {
        if index < CACHE_SLOTS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

type Cached = Arc<dyn Any + Send + Sync>;

/// Fixed-size side table of derived values. Never persisted.
#[derive(Clone, Default)]
pub struct EntryCache {
    slots: [Option<Cached>; CACHE_SLOTS],
}

impl EntryCache {
    /// The value in `key`'s slot, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: CacheKey) -> Option<Arc<T>> {
        self.slots[key.index()]
            .clone()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: CacheKey, value: T) {
        self.slots[key.index()] = Some(Arc::new(value));
    }

    pub fn remove(&mut self, key: CacheKey) -> bool {
        self.slots[key.index()].take().is_some()
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl fmt::Debug for EntryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryCache")
            .field("occupied", &self.occupied())
            .finish()
    }
}

/// One path-addressed record in a [`FileData`](crate::FileData) database.
///
/// `path` is the key users look entries up by; `hash` is the identity the
/// blob store deduplicates on. Entries sharing a hash read the same bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub(crate) path: String,
    pub(crate) hash: ContentHash,
    pub(crate) size: u64,
    pub(crate) guid: Option<Guid>,
    /// Seconds since the Unix epoch.
    pub(crate) timestamp: u32,
    #[serde(skip)]
    pub(crate) cache: EntryCache,
}

impl FileEntry {
    pub(crate) fn new(path: String, hash: ContentHash, size: u64) -> Self {
        Self {
            path,
            hash,
            size,
            guid: None,
            timestamp: 0,
            cache: EntryCache::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn cached<T: Any + Send + Sync>(&self, key: CacheKey) -> Option<Arc<T>> {
        self.cache.get(key)
    }

    /// Cache a derived value. Does not affect the database's dirty state.
    pub fn set_cached<T: Any + Send + Sync>(&mut self, key: CacheKey, value: T) {
        self.cache.set(key, value);
    }

    pub fn cache(&self) -> &EntryCache {
        &self.cache
    }
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.hash == other.hash
            && self.size == other.size
            && self.guid == other.guid
            && self.timestamp == other.timestamp
    }
}

impl Eq for FileEntry {}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {} bytes)", self.path, self.hash.short_hex(), self.size)
    }
}
