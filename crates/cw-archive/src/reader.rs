use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use cw_crypto::ContentHasher;
use cw_types::ContentHash;
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};
use crate::fat::{parse_table, ArchiveKind, FatEntry};
use crate::fragments::SkippedRange;

/// A decrypted archive container with its parsed table.
pub struct Archive {
    data: Vec<u8>,
    kind: ArchiveKind,
    entries: Vec<FatEntry>,
    data_len: usize,
    by_hash: HashMap<ContentHash, usize>,
    skipped: Vec<SkippedRange>,
}

/// Parse a decrypted archive.
pub fn open_archive(data: Vec<u8>) -> ArchiveResult<Archive> {
    Archive::from_bytes(data)
}

impl Archive {
    /// Parse a decrypted archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> ArchiveResult<Self> {
        Self::build(data, Vec::new())
    }

    /// Read and parse an archive file.
    pub fn open(path: &Path) -> ArchiveResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Parse bytes produced by fragment decryption.
    ///
    /// The plaintext was produced by the cipher, so any structural failure
    /// of the table means the key or fragments were wrong.
    pub(crate) fn from_decrypted(data: Vec<u8>, skipped: Vec<SkippedRange>) -> ArchiveResult<Self> {
        Self::build(data, skipped).map_err(|err| match err {
            ArchiveError::Format { offset, reason } => {
                ArchiveError::Crypto(format!("{reason} (offset {offset})"))
            }
            other => other,
        })
    }

    fn build(data: Vec<u8>, skipped: Vec<SkippedRange>) -> ArchiveResult<Self> {
        let table = parse_table(&data)?;
        if let Some(range) = skipped.iter().find(|r| r.end > table.data_len as u64) {
            return Err(ArchiveError::format(
                table.data_len,
                format!("table overlaps skipped fragment {}", range.fragment),
            ));
        }

        let mut by_hash = HashMap::with_capacity(table.entries.len());
        for (index, entry) in table.entries.iter().enumerate() {
            by_hash.entry(entry.hash).or_insert(index);
        }
        debug!(
            entries = table.entries.len(),
            kind = ?table.kind,
            skipped = skipped.len(),
            "opened archive"
        );
        Ok(Self {
            data,
            kind: table.kind,
            entries: table.entries,
            data_len: table.data_len,
            by_hash,
            skipped,
        })
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Table records in on-disk order.
    pub fn entries(&self) -> &[FatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the data region the table indexes.
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Byte ranges zero-filled during fragment assembly.
    pub fn skipped(&self) -> &[SkippedRange] {
        &self.skipped
    }

    /// First record for `hash`.
    pub fn get(&self, hash: &ContentHash) -> Option<&FatEntry> {
        self.by_hash.get(hash).map(|&index| &self.entries[index])
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// The exact bytes `[offset, offset + size)` of `entry`.
    pub fn extract(&self, entry: &FatEntry) -> ArchiveResult<&[u8]> {
        if entry.end() > self.data_len as u64 {
            return Err(ArchiveError::format(
                entry.offset as usize,
                format!("entry {} ends past the data region", entry.hash),
            ));
        }
        Ok(&self.data[entry.range()])
    }

    /// Bytes of the entry named `hash`.
    pub fn read(&self, hash: &ContentHash) -> ArchiveResult<&[u8]> {
        let entry = self.get(hash).ok_or(ArchiveError::EntryNotFound(*hash))?;
        self.extract(entry)
    }

    /// Whether none of the entry's bytes were lost to a skipped fragment.
    pub fn is_recoverable(&self, entry: &FatEntry) -> bool {
        !self.skipped.iter().any(|range| entry.overlaps(&range.range()))
    }

    /// Extract every entry, sorting them by how they survived assembly.
    pub fn extract_all(&self) -> ExtractionReport<'_> {
        let mut report = ExtractionReport {
            skipped: self.skipped.clone(),
            ..ExtractionReport::default()
        };
        for entry in &self.entries {
            if !self.is_recoverable(entry) {
                report.lost.push(*entry);
                continue;
            }
            let bytes = &self.data[entry.range()];
            if ContentHasher::verify(bytes, &entry.hash) {
                report.recovered.push((*entry, bytes));
            } else {
                report.corrupt.push(*entry);
            }
        }
        report
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("kind", &self.kind)
            .field("entries", &self.entries.len())
            .field("data_len", &self.data_len)
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// Outcome of [`Archive::extract_all`].
///
/// `recovered` entries are intact and match their hash. `lost` entries
/// overlap a skipped range. `corrupt` entries were fully present but their
/// bytes do not hash to the recorded value.
#[derive(Debug, Default)]
pub struct ExtractionReport<'a> {
    pub recovered: Vec<(FatEntry, &'a [u8])>,
    pub lost: Vec<FatEntry>,
    pub corrupt: Vec<FatEntry>,
    pub skipped: Vec<SkippedRange>,
}

impl ExtractionReport<'_> {
    /// True when every entry was recovered.
    pub fn is_complete(&self) -> bool {
        self.lost.is_empty() && self.corrupt.is_empty()
    }

    pub fn recovered_bytes(&self) -> u64 {
        self.recovered.iter().map(|(entry, _)| u64::from(entry.size)).sum()
    }
}
