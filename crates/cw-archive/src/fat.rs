//! The file allocation table at the tail of every archive.
//!
//! ```text
//! [data][count x {sha1[20], offset u32, size u32}][count u32][magic 4]
//! ```
//!
//! All integers are big-endian. Offsets are relative to the start of the
//! archive and every entry must lie inside the data region.

use std::ops::Range;

use cw_types::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

/// Encoded size of one table record.
pub const FAT_ENTRY_LEN: usize = ContentHash::LEN + 8;

/// Entry count plus trailing magic.
pub const TRAILER_LEN: usize = 8;

/// Archive-local index record: where a blob lives in the decrypted container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FatEntry {
    pub hash: ContentHash,
    pub offset: u32,
    pub size: u32,
}

impl FatEntry {
    /// One past the last byte of the entry.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }

    pub fn range(&self) -> Range<usize> {
        self.offset as usize..self.offset as usize + self.size as usize
    }

    /// Whether the entry shares at least one byte with `range`.
    pub fn overlaps(&self, range: &Range<u64>) -> bool {
        self.size > 0 && u64::from(self.offset) < range.end && range.start < self.end()
    }
}

/// Trailing magic identifying the archive flavour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveKind {
    /// Assembled from encrypted fragments.
    #[default]
    Far4,
    /// Plain, unfragmented archive.
    Farc,
}

impl ArchiveKind {
    pub const fn magic(self) -> &'static [u8; 4] {
        match self {
            Self::Far4 => b"FAR4",
            Self::Farc => b"FARC",
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        [Self::Far4, Self::Farc]
            .into_iter()
            .find(|kind| kind.magic().as_slice() == magic)
    }
}

/// A parsed table plus the extent of the data region it indexes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FatTable {
    pub kind: ArchiveKind,
    pub entries: Vec<FatEntry>,
    /// Length of the data region; the table starts here.
    pub data_len: usize,
}

/// Parse the table at the tail of a decrypted archive.
///
/// A missing or unknown trailing magic means the bytes were not decrypted
/// correctly and is reported as [`ArchiveError::Crypto`].
pub fn parse_table(data: &[u8]) -> ArchiveResult<FatTable> {
    if data.len() < TRAILER_LEN {
        return Err(ArchiveError::format(0, "too short for an archive trailer"));
    }
    let magic_at = data.len() - 4;
    let kind = ArchiveKind::from_magic(&data[magic_at..]).ok_or_else(|| {
        ArchiveError::Crypto(format!(
            "unrecognized trailing magic {:?}",
            String::from_utf8_lossy(&data[magic_at..])
        ))
    })?;

    let count_at = data.len() - TRAILER_LEN;
    let count = read_u32(data, count_at) as usize;
    let data_len = count
        .checked_mul(FAT_ENTRY_LEN)
        .and_then(|table_len| count_at.checked_sub(table_len))
        .ok_or_else(|| {
            ArchiveError::format(count_at, format!("{count} table entries do not fit the archive"))
        })?;

    let mut entries = Vec::with_capacity(count);
    for record in data[data_len..count_at].chunks_exact(FAT_ENTRY_LEN) {
        let at = data_len + entries.len() * FAT_ENTRY_LEN;
        let hash = ContentHash::from_slice(&record[..ContentHash::LEN])
            .map_err(|e| ArchiveError::format(at, e.to_string()))?;
        let entry = FatEntry {
            hash,
            offset: read_u32(record, ContentHash::LEN),
            size: read_u32(record, ContentHash::LEN + 4),
        };
        if entry.end() > data_len as u64 {
            return Err(ArchiveError::format(
                at,
                format!(
                    "entry {} spans [{}, {}) past the {data_len}-byte data region",
                    entry.hash,
                    entry.offset,
                    entry.end()
                ),
            ));
        }
        entries.push(entry);
    }

    Ok(FatTable {
        kind,
        entries,
        data_len,
    })
}

/// Append a table and trailer for `entries` to `buf`.
pub fn write_table(buf: &mut Vec<u8>, entries: &[FatEntry], kind: ArchiveKind) -> ArchiveResult<()> {
    let count = u32::try_from(entries.len()).map_err(|_| ArchiveError::TooLarge {
        size: entries.len() as u64,
    })?;
    buf.reserve(entries.len() * FAT_ENTRY_LEN + TRAILER_LEN);
    for entry in entries {
        buf.extend_from_slice(entry.hash.as_bytes());
        buf.extend_from_slice(&entry.offset.to_be_bytes());
        buf.extend_from_slice(&entry.size.to_be_bytes());
    }
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(kind.magic());
    Ok(())
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[at..at + 4]);
    u32::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(data: &[u8], offset: u32) -> FatEntry {
        FatEntry {
            hash: ContentHash::from_bytes(data),
            offset,
            size: data.len() as u32,
        }
    }

    #[test]
    fn table_roundtrip() {
        let mut buf = b"alphabeta".to_vec();
        let entries = vec![entry(b"alpha", 0), entry(b"beta", 5)];
        write_table(&mut buf, &entries, ArchiveKind::Far4).unwrap();
        assert_eq!(buf.len(), 9 + 2 * FAT_ENTRY_LEN + TRAILER_LEN);
        assert_eq!(&buf[buf.len() - 4..], b"FAR4");

        let table = parse_table(&buf).unwrap();
        assert_eq!(table.kind, ArchiveKind::Far4);
        assert_eq!(table.entries, entries);
        assert_eq!(table.data_len, 9);
    }

    #[test]
    fn empty_table() {
        let mut buf = Vec::new();
        write_table(&mut buf, &[], ArchiveKind::Farc).unwrap();
        let table = parse_table(&buf).unwrap();
        assert_eq!(table.kind, ArchiveKind::Farc);
        assert!(table.entries.is_empty());
        assert_eq!(table.data_len, 0);
    }

    #[test]
    fn bad_magic_is_crypto_error() {
        let mut buf = Vec::new();
        write_table(&mut buf, &[], ArchiveKind::Far4).unwrap();
        let len = buf.len();
        buf[len - 4..].copy_from_slice(b"\x13\x37\xbe\xef");
        assert!(matches!(parse_table(&buf), Err(ArchiveError::Crypto(_))));
    }

    #[test]
    fn oversized_count_is_format_error() {
        let mut buf = 1000u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"FAR4");
        assert!(matches!(parse_table(&buf), Err(ArchiveError::Format { .. })));
    }

    #[test]
    fn entry_past_data_region_is_rejected() {
        let mut buf = b"abc".to_vec();
        write_table(&mut buf, &[entry(b"abcd", 0)], ArchiveKind::Far4).unwrap();
        assert!(matches!(parse_table(&buf), Err(ArchiveError::Format { offset: 3, .. })));
    }

    #[test]
    fn short_input_is_format_error() {
        assert!(matches!(parse_table(b"FAR4"), Err(ArchiveError::Format { .. })));
    }

    #[test]
    fn overlap_ignores_empty_entries() {
        let e = entry(b"abcd", 4);
        assert!(e.overlaps(&(7..20)));
        assert!(!e.overlaps(&(8..20)));
        assert!(!e.overlaps(&(0..4)));
        assert!(!entry(b"", 5).overlaps(&(0..10)));
    }
}
