//! The [`FileData`] database: path-addressed entries over a blob store.
//!
//! The database owns its entries and a single dirty flag. Setters only mark
//! the database dirty when they actually change a value, so replaying the
//! same update leaves a clean database clean.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cw_types::{ContentHash, Guid};
use tracing::trace;

use crate::entry::{CacheKey, FileEntry};
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryObjectStore;
use crate::traits::ObjectStore;

/// Stable handle to an entry while it stays in its database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

/// Path-addressed resource database.
pub struct FileData {
    entries: BTreeMap<EntryId, FileEntry>,
    paths: BTreeMap<String, EntryId>,
    next_id: u32,
    dirty: bool,
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for FileData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileData")
            .field("entries", &self.entries.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl FileData {
    /// Create an empty database backed by `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            entries: BTreeMap::new(),
            paths: BTreeMap::new(),
            next_id: 0,
            dirty: false,
            store,
        }
    }

    /// Create an empty database with a private in-memory blob store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryObjectStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry changed since the database was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forget pending changes, e.g. after persisting them.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &FileEntry)> {
        self.paths
            .values()
            .filter_map(|id| self.entries.get(id).map(|entry| (*id, entry)))
    }

    // ---------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------

    /// Add an entry for bytes that are already in the blob store.
    ///
    /// Fails with [`StoreError::Argument`] if the path is empty, the hash is
    /// null, or the path is already taken.
    pub fn create(&mut self, path: &str, hash: ContentHash, size: u64) -> StoreResult<EntryId> {
        if path.is_empty() {
            return Err(StoreError::Argument("entry path is empty".into()));
        }
        if hash.is_null() {
            return Err(StoreError::Argument(format!("entry {path} has no hash")));
        }
        if self.paths.contains_key(path) {
            return Err(StoreError::Argument(format!("path already exists: {path}")));
        }
        Ok(self.insert(FileEntry::new(path.to_string(), hash, size)))
    }

    /// Store `data` and point `path` at it, creating the entry if needed.
    ///
    /// Updating an existing entry with identical bytes changes nothing.
    pub fn put(&mut self, path: &str, data: &[u8]) -> StoreResult<EntryId> {
        if let Some(id) = self.id_of(path) {
            let mut entry = self.entry_mut(id).ok_or_else(|| StoreError::NotFound(path.into()))?;
            entry.set_details(data)?;
            return Ok(id);
        }
        let hash = self.store.write(data)?;
        let id = self.create(path, hash, data.len() as u64)?;
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.timestamp = now_timestamp();
        }
        Ok(id)
    }

    pub(crate) fn clear_entries(&mut self) {
        self.entries.clear();
        self.paths.clear();
    }

    pub(crate) fn insert(&mut self, entry: FileEntry) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        mark_dirty(&mut self.dirty, &entry.path);
        self.paths.insert(entry.path.clone(), id);
        self.entries.insert(id, entry);
        id
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn id_of(&self, path: &str) -> Option<EntryId> {
        self.paths.get(path).copied()
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.id_of(path).and_then(|id| self.entries.get(&id))
    }

    pub fn entry(&self, id: EntryId) -> Option<&FileEntry> {
        self.entries.get(&id)
    }

    pub fn get_by_guid(&self, guid: Guid) -> Option<&FileEntry> {
        self.entries.values().find(|entry| entry.guid == Some(guid))
    }

    /// First entry, in path order, whose bytes hash to `hash`.
    pub fn get_by_hash(&self, hash: &ContentHash) -> Option<&FileEntry> {
        self.iter()
            .map(|(_, entry)| entry)
            .find(|entry| entry.hash == *hash)
    }

    pub fn contains_hash(&self, hash: &ContentHash) -> bool {
        self.entries.values().any(|entry| entry.hash == *hash)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    pub fn entry_mut(&mut self, id: EntryId) -> Option<EntryMut<'_>> {
        let Self {
            entries,
            paths,
            dirty,
            store,
            ..
        } = self;
        let entry = entries.get_mut(&id)?;
        Some(EntryMut {
            id,
            entry,
            paths,
            dirty,
            store: &**store,
        })
    }

    pub fn get_mut(&mut self, path: &str) -> Option<EntryMut<'_>> {
        let id = self.id_of(path)?;
        self.entry_mut(id)
    }

    /// Detach an entry from the database and hand it back.
    ///
    /// The blob stays in the store, so other entries and copies of the
    /// returned entry can still resolve its hash.
    pub fn remove(&mut self, id: EntryId) -> Option<FileEntry> {
        let entry = self.entries.remove(&id)?;
        self.paths.remove(&entry.path);
        mark_dirty(&mut self.dirty, &entry.path);
        Some(entry)
    }

    // ---------------------------------------------------------------
    // Reading
    // ---------------------------------------------------------------

    /// Bytes behind `path`.
    pub fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        let entry = self
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        self.read_entry(entry)
    }

    /// Bytes behind an entry, detached or not.
    pub fn read_entry(&self, entry: &FileEntry) -> StoreResult<Vec<u8>> {
        self.store
            .read(&entry.hash)?
            .ok_or_else(|| StoreError::NotFound(format!("blob {} for {}", entry.hash, entry.path)))
    }
}

/// Mutable view of one entry that keeps the database's dirty flag and path
/// index in step.
pub struct EntryMut<'a> {
    id: EntryId,
    entry: &'a mut FileEntry,
    paths: &'a mut BTreeMap<String, EntryId>,
    dirty: &'a mut bool,
    store: &'a dyn ObjectStore,
}

impl EntryMut<'_> {
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Rename the entry. Fails if the path is empty or used by another entry.
    pub fn set_path(&mut self, path: &str) -> StoreResult<()> {
        if path == self.entry.path {
            return Ok(());
        }
        if path.is_empty() {
            return Err(StoreError::Argument("entry path is empty".into()));
        }
        if self.paths.contains_key(path) {
            return Err(StoreError::Argument(format!("path already exists: {path}")));
        }
        self.paths.remove(&self.entry.path);
        self.paths.insert(path.to_string(), self.id);
        self.entry.path = path.to_string();
        mark_dirty(self.dirty, path);
        Ok(())
    }

    /// Point the entry at other bytes. Clears the derived-data cache.
    pub fn set_hash(&mut self, hash: ContentHash) {
        if hash == self.entry.hash {
            return;
        }
        self.entry.hash = hash;
        self.entry.cache.clear();
        mark_dirty(self.dirty, &self.entry.path);
    }

    pub fn set_size(&mut self, size: u64) {
        if size == self.entry.size {
            return;
        }
        self.entry.size = size;
        mark_dirty(self.dirty, &self.entry.path);
    }

    pub fn set_guid(&mut self, guid: Option<Guid>) {
        if guid == self.entry.guid {
            return;
        }
        self.entry.guid = guid;
        mark_dirty(self.dirty, &self.entry.path);
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        if timestamp == self.entry.timestamp {
            return;
        }
        self.entry.timestamp = timestamp;
        mark_dirty(self.dirty, &self.entry.path);
    }

    /// Store `data` and point the entry at it.
    pub fn set_details(&mut self, data: &[u8]) -> StoreResult<()> {
        let hash = self.store.write(data)?;
        if hash != self.entry.hash {
            self.set_timestamp(now_timestamp());
        }
        self.set_hash(hash);
        self.set_size(data.len() as u64);
        Ok(())
    }

    /// Copy hash and size from another entry.
    pub fn set_details_from(&mut self, other: &FileEntry) {
        self.set_size(other.size);
        self.set_hash(other.hash);
    }

    /// Cache a derived value. Does not mark the database dirty.
    pub fn set_cached<T: std::any::Any + Send + Sync>(&mut self, key: CacheKey, value: T) {
        self.entry.set_cached(key, value);
    }
}

impl Deref for EntryMut<'_> {
    type Target = FileEntry;

    fn deref(&self) -> &FileEntry {
        self.entry
    }
}

fn mark_dirty(dirty: &mut bool, path: &str) {
    if !*dirty {
        trace!(path, "database marked dirty");
    }
    *dirty = true;
}

pub(crate) fn now_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_path_and_hash() {
        let mut db = FileData::in_memory();
        let hash = ContentHash::from_bytes(b"x");
        assert!(matches!(db.create("", hash, 1), Err(StoreError::Argument(_))));
        assert!(matches!(
            db.create("a.bin", ContentHash::null(), 1),
            Err(StoreError::Argument(_))
        ));
        db.create("a.bin", hash, 1).unwrap();
        assert!(matches!(db.create("a.bin", hash, 1), Err(StoreError::Argument(_))));
    }

    #[test]
    fn put_then_read() {
        let mut db = FileData::in_memory();
        db.put("levels/intro.bin", b"level bytes").unwrap();
        assert_eq!(db.read("levels/intro.bin").unwrap(), b"level bytes");
        let entry = db.get("levels/intro.bin").unwrap();
        assert_eq!(entry.size(), 11);
        assert_eq!(entry.hash(), ContentHash::from_bytes(b"level bytes"));
        assert!(entry.timestamp() > 0);
    }

    #[test]
    fn read_missing_path_is_not_found() {
        let db = FileData::in_memory();
        assert!(matches!(db.read("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn shared_hash_reads_identical_bytes() {
        let mut db = FileData::in_memory();
        db.put("a.tex", b"pixels").unwrap();
        db.put("b.tex", b"pixels").unwrap();
        assert_eq!(db.get("a.tex").unwrap().hash(), db.get("b.tex").unwrap().hash());
        assert_eq!(db.read("a.tex").unwrap(), db.read("b.tex").unwrap());
    }

    #[test]
    fn entry_view_writes_through_shared_store() {
        let mut db = FileData::in_memory();
        let id = db.put("slots/moon.slt", b"old").unwrap();
        let mut entry = db.get_mut("slots/moon.slt").unwrap();
        entry.set_details(b"new contents").unwrap();
        assert_eq!(entry.id(), id);
        assert_eq!(entry.size(), 12);
        drop(entry);

        assert_eq!(db.read("slots/moon.slt").unwrap(), b"new contents");
        assert!(db.store().exists(&ContentHash::from_bytes(b"old")).unwrap());
    }

    #[test]
    fn hash_setter_is_idempotent() {
        let mut db = FileData::in_memory();
        let id = db.put("a.bin", b"a").unwrap();
        db.mark_clean();

        let current = db.entry(id).unwrap().hash();
        db.entry_mut(id).unwrap().set_hash(current);
        assert!(!db.is_dirty());

        let other = ContentHash::from_bytes(b"b");
        db.entry_mut(id).unwrap().set_hash(other);
        assert!(db.is_dirty());
        db.mark_clean();
        db.entry_mut(id).unwrap().set_hash(other);
        assert!(!db.is_dirty());
    }

    #[test]
    fn size_path_and_guid_setters_are_idempotent() {
        let mut db = FileData::in_memory();
        let id = db.put("a.bin", b"abc").unwrap();
        db.mark_clean();

        let mut entry = db.entry_mut(id).unwrap();
        entry.set_size(3);
        entry.set_path("a.bin").unwrap();
        entry.set_guid(None);
        assert!(!db.is_dirty());

        db.entry_mut(id).unwrap().set_guid(Some(Guid(10)));
        assert!(db.is_dirty());
        assert_eq!(db.get_by_guid(Guid(10)).unwrap().path(), "a.bin");
    }

    #[test]
    fn put_same_bytes_keeps_database_clean() {
        let mut db = FileData::in_memory();
        db.put("a.bin", b"same").unwrap();
        db.mark_clean();
        db.put("a.bin", b"same").unwrap();
        assert!(!db.is_dirty());
        db.put("a.bin", b"changed").unwrap();
        assert!(db.is_dirty());
        assert_eq!(db.read("a.bin").unwrap(), b"changed");
    }

    #[test]
    fn rename_updates_path_index() {
        let mut db = FileData::in_memory();
        let id = db.put("old.bin", b"x").unwrap();
        db.put("taken.bin", b"y").unwrap();

        let mut entry = db.entry_mut(id).unwrap();
        assert!(matches!(entry.set_path("taken.bin"), Err(StoreError::Argument(_))));
        assert!(matches!(entry.set_path(""), Err(StoreError::Argument(_))));
        entry.set_path("new.bin").unwrap();

        assert!(db.get("old.bin").is_none());
        assert_eq!(db.id_of("new.bin"), Some(id));
    }

    #[test]
    fn hash_change_clears_cache() {
        let mut db = FileData::in_memory();
        let id = db.put("a.bin", b"a").unwrap();
        db.entry_mut(id).unwrap().set_cached(CacheKey::THUMBNAIL, 42u32);
        db.mark_clean();
        assert!(db.entry(id).unwrap().cached::<u32>(CacheKey::THUMBNAIL).is_some());
        assert!(!db.is_dirty());

        db.entry_mut(id).unwrap().set_hash(db_hash(b"b"));
        assert!(db.entry(id).unwrap().cached::<u32>(CacheKey::THUMBNAIL).is_none());
    }

    fn db_hash(data: &[u8]) -> ContentHash {
        ContentHash::from_bytes(data)
    }

    #[test]
    fn remove_detaches_entry() {
        let mut db = FileData::in_memory();
        let id = db.put("a.bin", b"payload").unwrap();
        db.put("b.bin", b"payload").unwrap();
        db.mark_clean();

        let detached = db.remove(id).unwrap();
        assert!(db.is_dirty());
        assert!(db.get("a.bin").is_none());
        assert!(db.entry(id).is_none());
        assert!(db.remove(id).is_none());

        // The blob is still reachable through the detached entry.
        assert_eq!(db.read_entry(&detached).unwrap(), b"payload");
        assert_eq!(db.get_by_hash(&detached.hash()).unwrap().path(), "b.bin");
    }

    #[test]
    fn set_details_from_copies_hash_and_size() {
        let mut db = FileData::in_memory();
        let a = db.put("a.bin", b"aaaa").unwrap();
        let b = db.put("b.bin", b"b").unwrap();
        let source = db.entry(a).unwrap().clone();
        db.entry_mut(b).unwrap().set_details_from(&source);
        assert_eq!(db.read("b.bin").unwrap(), b"aaaa");
        assert_eq!(db.entry(b).unwrap().size(), 4);
    }

    #[test]
    fn iter_is_path_ordered() {
        let mut db = FileData::in_memory();
        db.put("z.bin", b"z").unwrap();
        db.put("a.bin", b"a").unwrap();
        let paths: Vec<&str> = db.iter().map(|(_, e)| e.path()).collect();
        assert_eq!(paths, vec!["a.bin", "z.bin"]);
    }
}
