//! Foundation types for the Craftworld toolkit.
//!
//! Every other `cw-*` crate depends on `cw-types`. The types here are plain
//! values: they carry no I/O and know nothing about the binary layouts that
//! embed them.
//!
//! # Key Types
//!
//! - [`ContentHash`]: SHA-1 content address of a byte payload
//! - [`Guid`]: compact integer resource identifier
//! - [`Revision`] / [`Branch`]: selects the active on-disk field layout
//! - [`ResourceType`] / [`ResourceDescriptor`]: typed, lazily resolved references
//! - [`CompressionFlags`]: per-payload field compression switches

pub mod compression;
pub mod error;
pub mod hash;
pub mod resource;
pub mod revision;

pub use compression::CompressionFlags;
pub use error::TypeError;
pub use hash::ContentHash;
pub use resource::{Guid, ResourceDescriptor, ResourceKey, ResourceType};
pub use revision::{Branch, Revision};
