//! Archive containers for the Craftworld toolkit.
//!
//! An archive is a blob of concatenated resource payloads indexed by a file
//! allocation table (FAT) at its tail. Shipped archives are split into
//! encrypted fragments that must be decrypted and reassembled before the
//! table can be read.
//!
//! # Architecture
//!
//! - **FAT** (`fat`): `{sha1, offset, size}` records plus a count and magic trailer
//! - **Archive** (`reader`): parsed container with exact-slice `extract`
//! - **ArchiveWriter**: builds containers, storing each distinct blob once
//! - **FragmentCodec**: splits/encrypts and decrypts/assembles fragments,
//!   reporting unreadable fragments as skipped ranges
//! - **ArchiveSet**: searches several archives and imports them into a store
//!
//! Extraction never decompresses: payload compression belongs to the
//! serializer.

pub mod error;
pub mod fat;
pub mod fragments;
pub mod manager;
pub mod reader;
pub mod writer;

pub use error::{ArchiveError, ArchiveResult};
pub use fat::{parse_table, write_table, ArchiveKind, FatEntry, FatTable, FAT_ENTRY_LEN};
pub use fragments::{
    read_fragment_files, Assembled, FragmentCodec, SkippedRange, FOOTER_LEN, FRAGMENT_SIZE,
    MAX_FRAGMENT_SIZE,
};
pub use manager::{ArchiveSet, ImportReport};
pub use reader::{open_archive, Archive, ExtractionReport};
pub use writer::{ArchiveFile, ArchiveWriter};
