use std::path::Path;

use cw_store::FileData;
use cw_types::ContentHash;
use tracing::{debug, warn};

use crate::error::ArchiveResult;
use crate::fat::FatEntry;
use crate::reader::Archive;

/// Result of copying archive contents into a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub already_present: usize,
    pub lost: usize,
    pub corrupt: usize,
}

/// Several archives searched in load order.
#[derive(Debug, Default)]
pub struct ArchiveSet {
    archives: Vec<Archive>,
}

impl ArchiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.farc` file in `dir`, in file name order.
    ///
    /// Archives that fail to parse are skipped with a warning.
    pub fn load_dir(dir: &Path) -> ArchiveResult<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "farc") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut set = Self::new();
        for path in paths {
            match Archive::open(&path) {
                Ok(archive) => set.push(archive),
                Err(e) => warn!("skipping unreadable archive {:?}: {}", path, e),
            }
        }
        Ok(set)
    }

    pub fn push(&mut self, archive: Archive) {
        self.archives.push(archive);
    }

    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Table records across all archives, duplicates included.
    pub fn total_entries(&self) -> usize {
        self.archives.iter().map(Archive::len).sum()
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.archives.iter().any(|archive| archive.contains(hash))
    }

    /// First recoverable record for `hash` and the archive holding it.
    pub fn find(&self, hash: &ContentHash) -> Option<(&Archive, &FatEntry)> {
        self.archives.iter().find_map(|archive| {
            archive
                .get(hash)
                .filter(|entry| archive.is_recoverable(entry))
                .map(|entry| (archive, entry))
        })
    }

    /// Bytes for `hash` from the first archive that holds them intact.
    pub fn read(&self, hash: &ContentHash) -> ArchiveResult<Option<&[u8]>> {
        match self.find(hash) {
            Some((archive, entry)) => archive.extract(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Copy every recovered entry into `db`'s object store.
    ///
    /// Blobs the store already holds are not written again. Entries lost to
    /// skipped fragments or failing their hash are counted, not imported.
    pub fn import_into(&self, db: &FileData) -> ArchiveResult<ImportReport> {
        let store = db.store();
        let mut report = ImportReport::default();
        for archive in &self.archives {
            let extracted = archive.extract_all();
            report.lost += extracted.lost.len();
            report.corrupt += extracted.corrupt.len();
            for (entry, bytes) in extracted.recovered {
                if store.exists(&entry.hash)? {
                    report.already_present += 1;
                } else {
                    store.write(bytes)?;
                    report.imported += 1;
                }
            }
        }
        debug!(
            imported = report.imported,
            already_present = report.already_present,
            lost = report.lost,
            "imported archives"
        );
        Ok(report)
    }
}
