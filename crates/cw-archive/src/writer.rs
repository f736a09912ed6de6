use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cw_crypto::ContentHasher;
use cw_types::ContentHash;
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};
use crate::fat::{write_table, ArchiveKind, FatEntry};

/// Result of writing an archive to disk.
#[derive(Clone, Debug)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub entry_count: usize,
    pub size: u64,
}

/// Builds an archive container from blobs, storing each distinct blob once.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    kind: ArchiveKind,
    data: Vec<u8>,
    entries: Vec<FatEntry>,
    by_hash: HashMap<ContentHash, usize>,
}

impl ArchiveWriter {
    pub fn new(kind: ArchiveKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Append a blob and return its table record.
    ///
    /// A blob whose hash is already present is not stored again; the
    /// existing record is returned.
    pub fn add(&mut self, blob: &[u8]) -> ArchiveResult<FatEntry> {
        let hash = ContentHasher::hash(blob);
        if let Some(&index) = self.by_hash.get(&hash) {
            return Ok(self.entries[index]);
        }

        let end = self.data.len() as u64 + blob.len() as u64;
        let too_large = || ArchiveError::TooLarge { size: end };
        let entry = FatEntry {
            hash,
            offset: u32::try_from(self.data.len()).map_err(|_| too_large())?,
            size: u32::try_from(blob.len()).map_err(|_| too_large())?,
        };
        u32::try_from(end).map_err(|_| too_large())?;

        self.data.extend_from_slice(blob);
        self.by_hash.insert(hash, self.entries.len());
        self.entries.push(entry);
        Ok(entry)
    }

    /// Number of distinct blobs queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FatEntry] {
        &self.entries
    }

    /// Build the container in memory.
    pub fn finish_to_bytes(self) -> ArchiveResult<Vec<u8>> {
        let Self {
            kind,
            mut data,
            entries,
            ..
        } = self;
        write_table(&mut data, &entries, kind)?;
        debug!(entries = entries.len(), bytes = data.len(), ?kind, "built archive");
        Ok(data)
    }

    /// Write the container to `path`.
    pub fn finish(self, path: &Path) -> ArchiveResult<ArchiveFile> {
        let entry_count = self.len();
        let bytes = self.finish_to_bytes()?;
        std::fs::write(path, &bytes)?;
        Ok(ArchiveFile {
            path: path.to_path_buf(),
            entry_count,
            size: bytes.len() as u64,
        })
    }
}
