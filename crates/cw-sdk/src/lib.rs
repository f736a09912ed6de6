//! High-level SDK for the Craftworld toolkit.
//!
//! [`Toolkit`] is the entry point for applications: it serializes and
//! deserializes resources, opens and extracts archives, and reads and writes
//! the file database, falling back to mounted archives for blobs the local
//! store does not hold.

pub mod decoded;
pub mod error;
pub mod toolkit;

pub use decoded::{DecodedResource, ResourceReport};
pub use error::{SdkError, SdkResult};
pub use toolkit::Toolkit;

// Re-export key types
pub use cw_archive::{Archive, ArchiveKind, ArchiveWriter, FatEntry, FragmentCodec, SkippedRange};
pub use cw_resources::{GfxMaterialHeader, Level, Thing, ThingGraph, ThingRef};
pub use cw_store::{FileData, FileEntry};
pub use cw_types::{Branch, CompressionFlags, ContentHash, Guid, ResourceType, Revision};
