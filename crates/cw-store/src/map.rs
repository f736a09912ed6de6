//! `.map` database persistence.
//!
//! Layout, big-endian:
//!
//! ```text
//! [version i32][count i32]
//! count x {path_len u16, path, timestamp u32, size u32, sha1[20], guid u32}
//! ```
//!
//! A zero GUID means the entry has none. Blobs are not part of the file;
//! only the entry table is persisted.

use std::collections::BTreeSet;
use std::path::Path;

use cw_types::{ContentHash, Guid};
use tracing::debug;

use crate::database::FileData;
use crate::entry::FileEntry;
use crate::error::{StoreError, StoreResult};

/// Format version written by [`FileData::to_map_bytes`].
pub const MAP_VERSION: i32 = 0x100;

impl FileData {
    /// Encode the entry table in path order.
    pub fn to_map_bytes(&self) -> StoreResult<Vec<u8>> {
        let count = i32::try_from(self.len())
            .map_err(|_| StoreError::Argument("too many entries for a map file".into()))?;
        let mut buf = Vec::with_capacity(8 + self.len() * 64);
        buf.extend_from_slice(&MAP_VERSION.to_be_bytes());
        buf.extend_from_slice(&count.to_be_bytes());

        for (_, entry) in self.iter() {
            let path_len = u16::try_from(entry.path.len()).map_err(|_| {
                StoreError::Argument(format!("path too long for a map file: {}", entry.path))
            })?;
            let size = u32::try_from(entry.size).map_err(|_| {
                StoreError::Argument(format!("{} is too large for a map file", entry.path))
            })?;
            buf.extend_from_slice(&path_len.to_be_bytes());
            buf.extend_from_slice(entry.path.as_bytes());
            buf.extend_from_slice(&entry.timestamp.to_be_bytes());
            buf.extend_from_slice(&size.to_be_bytes());
            buf.extend_from_slice(entry.hash.as_bytes());
            buf.extend_from_slice(&entry.guid.map_or(0, |guid| guid.0).to_be_bytes());
        }
        Ok(buf)
    }

    /// Replace this database's entries with those in a map file.
    ///
    /// The database is clean afterwards.
    pub fn load_map_bytes(&mut self, data: &[u8]) -> StoreResult<()> {
        let mut reader = MapReader { data, pos: 0 };
        let version = reader.i32()?;
        if version != MAP_VERSION {
            return Err(StoreError::corrupt(0, format!("unsupported map version {version:#x}")));
        }
        let count = reader.i32()?;
        let count = usize::try_from(count)
            .map_err(|_| StoreError::corrupt(4, format!("negative entry count {count}")))?;

        let mut entries = Vec::with_capacity(count.min(data.len() / 34));
        let mut seen = BTreeSet::new();
        for _ in 0..count {
            let path_len = reader.u16()? as usize;
            let path_start = reader.pos;
            let path = std::str::from_utf8(reader.take(path_len)?)
                .map_err(|e| StoreError::corrupt(path_start, format!("path is not UTF-8: {e}")))?
                .to_string();
            let timestamp = reader.u32()?;
            let size = reader.u32()?;
            let hash = ContentHash::from_slice(reader.take(ContentHash::LEN)?)
                .map_err(|e| StoreError::corrupt(reader.pos, e.to_string()))?;
            let guid = reader.u32()?;
            if !seen.insert(path.clone()) {
                return Err(StoreError::corrupt(path_start, format!("duplicate path {path}")));
            }

            let mut entry = FileEntry::new(path, hash, u64::from(size));
            entry.timestamp = timestamp;
            entry.guid = (guid != 0).then_some(Guid(guid));
            entries.push(entry);
        }
        if reader.pos != data.len() {
            return Err(StoreError::corrupt(reader.pos, "trailing bytes after entry table"));
        }

        self.clear_entries();
        for entry in entries {
            self.insert(entry);
        }
        self.mark_clean();
        debug!(entries = count, "loaded map database");
        Ok(())
    }

    /// Load a map file into this database.
    pub fn load(&mut self, path: &Path) -> StoreResult<()> {
        let data = std::fs::read(path)?;
        self.load_map_bytes(&data)
    }

    /// Write the entry table to `path` and mark the database clean.
    pub fn save(&mut self, path: &Path) -> StoreResult<()> {
        let data = self.to_map_bytes()?;
        std::fs::write(path, data)?;
        self.mark_clean();
        debug!(entries = self.len(), path = %path.display(), "saved map database");
        Ok(())
    }
}

struct MapReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MapReader<'a> {
    fn take(&mut self, len: usize) -> StoreResult<&'a [u8]> {
        let end = self.pos.saturating_add(len);
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| StoreError::corrupt(self.pos, format!("truncated: need {len} bytes")))?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> StoreResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> StoreResult<u16> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> StoreResult<u32> {
        self.array().map(u32::from_be_bytes)
    }

    fn i32(&mut self) -> StoreResult<i32> {
        self.array().map(i32::from_be_bytes)
    }
}
