//! Revision-aware, bidirectional binary codec for Craftworld resources.
//!
//! One [`Serializer`] drives both directions: a type implements
//! [`Serializable::serialize`] once, listing its fields in declared order,
//! and the same method decodes from a byte cursor or encodes into a buffer.
//!
//! # Architecture
//!
//! - **RevisionGate** ([`FieldRule`], [`gate::include`]): per-field presence
//!   rules evaluated against the active [`Revision`](cw_types::Revision)
//! - **Serializer**: symmetric typed accessors with LEB128 integer, length
//!   and matrix-mask compression
//! - **ResourceGraph**: per-call identity registry and dependency set
//! - **codec**: `serialize` / `deserialize` / `verify` entry points
//! - **container**: standalone resource files with a dependency table
//!
//! Every call owns its serializer, registry and revision; nothing is global.

pub mod codec;
pub mod container;
pub mod error;
pub mod gate;
pub mod graph;
pub mod serializer;
pub mod traits;
pub mod varint;

pub use codec::{decode, deserialize, encode, serialize, verify, Encoded};
pub use container::{decode_resource, encode_resource, ResourceFile};
pub use error::{SerializerError, SerializerResult};
pub use gate::{FieldRule, Head};
pub use graph::{ResourceGraph, Visit};
pub use serializer::{Direction, Serializer, MAX_EMPTY_ELEMENTS};
pub use traits::{Resource, Serializable};
