//! The bidirectional serializer.
//!
//! A [`Serializer`] wraps either a decode cursor or an encode buffer. Every
//! accessor takes `&mut` to the in-memory value: when decoding it overwrites
//! the value with what it read, when encoding it writes the value unchanged.
//! A type therefore describes its layout once, in one `serialize` method, and
//! that description drives both directions.

use cw_types::{
    CompressionFlags, ContentHash, Guid, ResourceDescriptor, ResourceKey, ResourceType, Revision,
};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::{SerializerError, SerializerResult};
use crate::gate::{self, FieldRule};
use crate::graph::{ResourceGraph, Visit};
use crate::traits::Serializable;
use crate::varint::{decode_varint, encode_varint, unzigzag32, unzigzag64, zigzag32, zigzag64};

/// Versions at or below this swap the hash and GUID reference kind codes.
const SWAPPED_REFERENCE_KINDS_MAX: u32 = 0x18b;

/// Typed references carry a `u16` resource type from this version on.
const WIDE_REFERENCE_TYPE_MIN: u32 = 0x230;

/// Longest array of elements that encode to zero bytes.
pub const MAX_EMPTY_ELEMENTS: usize = 0x10000;

/// Which way bytes flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Decode,
    Encode,
}

enum Stream<'a> {
    Decode { data: &'a [u8], pos: usize },
    Encode { buf: Vec<u8> },
}

/// Bidirectional, revision-aware binary serializer.
pub struct Serializer<'a> {
    stream: Stream<'a>,
    revision: Revision,
    compression: CompressionFlags,
    graph: ResourceGraph,
}

impl<'a> Serializer<'a> {
    /// Start decoding `data`, a `[compression flags][fields...]` payload.
    pub fn reader(data: &'a [u8], revision: Revision) -> SerializerResult<Self> {
        check_revision(revision)?;
        let (&bits, _) = data
            .split_first()
            .ok_or_else(|| SerializerError::format(0, "missing compression flags"))?;
        let compression = CompressionFlags::from_bits(bits)
            .map_err(|e| SerializerError::format(0, e.to_string()))?;
        Ok(Self {
            stream: Stream::Decode { data, pos: 1 },
            revision,
            compression,
            graph: ResourceGraph::new(),
        })
    }

    /// Start encoding with the given compression flags.
    pub fn writer(
        revision: Revision,
        compression: CompressionFlags,
        capacity: usize,
    ) -> SerializerResult<Serializer<'static>> {
        check_revision(revision)?;
        let mut buf = Vec::with_capacity(capacity.max(1));
        buf.push(compression.bits());
        Ok(Serializer {
            stream: Stream::Encode { buf },
            revision,
            compression,
            graph: ResourceGraph::new(),
        })
    }

    pub fn direction(&self) -> Direction {
        match self.stream {
            Stream::Decode { .. } => Direction::Decode,
            Stream::Encode { .. } => Direction::Encode,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.direction() == Direction::Decode
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn compression(&self) -> CompressionFlags {
        self.compression
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ResourceGraph {
        &mut self.graph
    }

    /// Byte offset of the cursor (decode) or bytes written so far (encode).
    pub fn position(&self) -> usize {
        match &self.stream {
            Stream::Decode { pos, .. } => *pos,
            Stream::Encode { buf } => buf.len(),
        }
    }

    /// Bytes left to decode. Unbounded when encoding.
    pub fn remaining(&self) -> usize {
        match &self.stream {
            Stream::Decode { data, pos } => data.len() - *pos,
            Stream::Encode { .. } => usize::MAX,
        }
    }

    /// Finish the pass, returning the encoded bytes (empty when decoding) and
    /// the registry that was built.
    pub fn finish(self) -> (Vec<u8>, ResourceGraph) {
        let bytes = match self.stream {
            Stream::Decode { .. } => Vec::new(),
            Stream::Encode { buf } => buf,
        };
        (bytes, self.graph)
    }

    pub fn error(&self, reason: impl Into<String>) -> SerializerError {
        SerializerError::format(self.position(), reason)
    }

    // ---------------------------------------------------------------
    // Revision gate
    // ---------------------------------------------------------------

    /// Whether a field guarded by `rules` is present in the active layout.
    pub fn gate(&self, rules: &[FieldRule]) -> bool {
        gate::include(rules, &self.revision)
    }

    /// Run `field` only when `rules` admit the active revision.
    pub fn gated<F>(&mut self, rules: &[FieldRule], field: F) -> SerializerResult<()>
    where
        F: FnOnce(&mut Self) -> SerializerResult<()>,
    {
        if self.gate(rules) {
            field(self)
        } else {
            Ok(())
        }
    }

    // ---------------------------------------------------------------
    // Raw transfer
    // ---------------------------------------------------------------

    fn fixed<const N: usize>(&mut self, bytes: [u8; N]) -> SerializerResult<[u8; N]> {
        match &mut self.stream {
            Stream::Decode { data, pos } => {
                let end = *pos + N;
                let slice = data.get(*pos..end).ok_or_else(|| {
                    SerializerError::format(*pos, format!("truncated: need {N} bytes"))
                })?;
                let mut out = [0u8; N];
                out.copy_from_slice(slice);
                *pos = end;
                Ok(out)
            }
            Stream::Encode { buf } => {
                buf.extend_from_slice(&bytes);
                Ok(bytes)
            }
        }
    }

    fn varint(&mut self, value: u64) -> SerializerResult<u64> {
        match &mut self.stream {
            Stream::Decode { data, pos } => {
                let (value, consumed) = decode_varint(&data[*pos..])
                    .map_err(|reason| SerializerError::format(*pos, reason))?;
                *pos += consumed;
                Ok(value)
            }
            Stream::Encode { buf } => {
                encode_varint(buf, value);
                Ok(value)
            }
        }
    }

    fn raw(&mut self, value: &mut Vec<u8>, len: usize) -> SerializerResult<()> {
        match &mut self.stream {
            Stream::Decode { data, pos } => {
                let end = *pos + len;
                let slice = data.get(*pos..end).ok_or_else(|| {
                    SerializerError::format(*pos, format!("truncated: need {len} bytes"))
                })?;
                value.clear();
                value.extend_from_slice(slice);
                *pos = end;
            }
            Stream::Encode { buf } => buf.extend_from_slice(value),
        }
        Ok(())
    }

    /// Transfer an array length prefix and validate it against the buffer.
    ///
    /// `min_element_size` is the smallest encoding of one element; a decoded
    /// length that could not fit in the remaining bytes is rejected.
    pub fn length(&mut self, len: usize, min_element_size: usize) -> SerializerResult<usize> {
        let start = self.position();
        let len = if self.compression.contains(CompressionFlags::VECTORS) {
            let value = self.varint(len as u64)?;
            usize::try_from(value)
                .ok()
                .filter(|&n| n <= i32::MAX as usize)
                .ok_or_else(|| SerializerError::format(start, "length prefix overflows"))?
        } else {
            let encoded = i32::try_from(len)
                .map_err(|_| SerializerError::format(start, "array too long to encode"))?;
            let value = i32::from_be_bytes(self.fixed(encoded.to_be_bytes())?);
            usize::try_from(value).map_err(|_| {
                SerializerError::format(start, format!("negative length prefix {value}"))
            })?
        };
        if len.saturating_mul(min_element_size) > self.remaining() {
            return Err(SerializerError::format(
                start,
                format!("length prefix {len} exceeds remaining buffer"),
            ));
        }
        Ok(len)
    }

    // ---------------------------------------------------------------
    // Fixed-width scalars
    // ---------------------------------------------------------------

    pub fn bool(&mut self, value: &mut bool) -> SerializerResult<()> {
        let mut byte = u8::from(*value);
        self.u8(&mut byte)?;
        *value = byte != 0;
        Ok(())
    }

    pub fn u8(&mut self, value: &mut u8) -> SerializerResult<()> {
        *value = self.fixed([*value])?[0];
        Ok(())
    }

    pub fn i8(&mut self, value: &mut i8) -> SerializerResult<()> {
        *value = i8::from_be_bytes(self.fixed(value.to_be_bytes())?);
        Ok(())
    }

    pub fn u16(&mut self, value: &mut u16) -> SerializerResult<()> {
        *value = u16::from_be_bytes(self.fixed(value.to_be_bytes())?);
        Ok(())
    }

    pub fn i16(&mut self, value: &mut i16) -> SerializerResult<()> {
        *value = i16::from_be_bytes(self.fixed(value.to_be_bytes())?);
        Ok(())
    }

    pub fn f32(&mut self, value: &mut f32) -> SerializerResult<()> {
        *value = f32::from_be_bytes(self.fixed(value.to_be_bytes())?);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Compressible integers
    // ---------------------------------------------------------------

    pub fn u32(&mut self, value: &mut u32) -> SerializerResult<()> {
        if self.compression.contains(CompressionFlags::INTEGERS) {
            let start = self.position();
            let wide = self.varint(u64::from(*value))?;
            *value = u32::try_from(wide)
                .map_err(|_| SerializerError::format(start, "LEB128 value overflows u32"))?;
        } else {
            *value = u32::from_be_bytes(self.fixed(value.to_be_bytes())?);
        }
        Ok(())
    }

    /// Signed 32-bit integer; zig-zag mapped when integers are compressed.
    pub fn i32(&mut self, value: &mut i32) -> SerializerResult<()> {
        if self.compression.contains(CompressionFlags::INTEGERS) {
            let mut raw = zigzag32(*value);
            self.u32(&mut raw)?;
            *value = unzigzag32(raw);
        } else {
            *value = i32::from_be_bytes(self.fixed(value.to_be_bytes())?);
        }
        Ok(())
    }

    pub fn u64(&mut self, value: &mut u64) -> SerializerResult<()> {
        if self.compression.contains(CompressionFlags::INTEGERS) {
            *value = self.varint(*value)?;
        } else {
            *value = u64::from_be_bytes(self.fixed(value.to_be_bytes())?);
        }
        Ok(())
    }

    /// Signed 64-bit integer; zig-zag mapped when integers are compressed.
    pub fn i64(&mut self, value: &mut i64) -> SerializerResult<()> {
        if self.compression.contains(CompressionFlags::INTEGERS) {
            *value = unzigzag64(self.varint(zigzag64(*value))?);
        } else {
            *value = i64::from_be_bytes(self.fixed(value.to_be_bytes())?);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Vectors and matrices
    // ---------------------------------------------------------------

    pub fn v2(&mut self, value: &mut Vec2) -> SerializerResult<()> {
        self.f32(&mut value.x)?;
        self.f32(&mut value.y)
    }

    pub fn v3(&mut self, value: &mut Vec3) -> SerializerResult<()> {
        self.f32(&mut value.x)?;
        self.f32(&mut value.y)?;
        self.f32(&mut value.z)
    }

    pub fn v4(&mut self, value: &mut Vec4) -> SerializerResult<()> {
        self.f32(&mut value.x)?;
        self.f32(&mut value.y)?;
        self.f32(&mut value.z)?;
        self.f32(&mut value.w)
    }

    /// 4x4 matrix in column-major order.
    ///
    /// Under matrix compression a `u16` mask precedes the components; bit `i`
    /// marks component `i` as stored, cleared bits decode to the identity.
    pub fn m44(&mut self, value: &mut Mat4) -> SerializerResult<()> {
        let mut cols = value.to_cols_array();
        if self.compression.contains(CompressionFlags::MATRICES) {
            let identity = Mat4::IDENTITY.to_cols_array();
            let mut mask = cols
                .iter()
                .zip(identity.iter())
                .enumerate()
                .filter(|(_, (c, i))| c.to_bits() != i.to_bits())
                .fold(0u16, |mask, (bit, _)| mask | (1 << bit));
            self.u16(&mut mask)?;
            for (bit, component) in cols.iter_mut().enumerate() {
                if mask & (1 << bit) != 0 {
                    self.f32(component)?;
                } else {
                    *component = identity[bit];
                }
            }
        } else {
            for component in cols.iter_mut() {
                self.f32(component)?;
            }
        }
        *value = Mat4::from_cols_array(&cols);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Variable-length data
    // ---------------------------------------------------------------

    /// Length-prefixed byte array.
    pub fn bytes(&mut self, value: &mut Vec<u8>) -> SerializerResult<()> {
        let len = self.length(value.len(), 1)?;
        self.raw(value, len)
    }

    /// Length-prefixed UTF-8 string.
    pub fn str(&mut self, value: &mut String) -> SerializerResult<()> {
        let start = self.position();
        let mut bytes = std::mem::take(value).into_bytes();
        self.bytes(&mut bytes)?;
        *value = String::from_utf8(bytes)
            .map_err(|e| SerializerError::format(start, format!("invalid UTF-8: {e}")))?;
        Ok(())
    }

    /// Array of `u32`; elements are LEB128 under vector compression.
    pub fn u32_array(&mut self, value: &mut Vec<u32>) -> SerializerResult<()> {
        let compressed = self.compression.contains(CompressionFlags::VECTORS);
        let len = self.length(value.len(), if compressed { 1 } else { 4 })?;
        value.resize(len, 0);
        for element in value.iter_mut() {
            if compressed {
                let start = self.position();
                let wide = self.varint(u64::from(*element))?;
                *element = u32::try_from(wide)
                    .map_err(|_| SerializerError::format(start, "LEB128 value overflows u32"))?;
            } else {
                *element = u32::from_be_bytes(self.fixed(element.to_be_bytes())?);
            }
        }
        Ok(())
    }

    /// Nested serializable value.
    pub fn value<T: Serializable>(&mut self, value: &mut T) -> SerializerResult<()> {
        value.serialize(self)
    }

    /// Length-prefixed array of nested values.
    ///
    /// An element may have no fields at the active revision and take zero
    /// bytes. Such an element reads nothing, so every element after it is a
    /// default value too; a run of them is capped at
    /// [`MAX_EMPTY_ELEMENTS`] in both directions.
    pub fn array<T: Serializable>(&mut self, value: &mut Vec<T>) -> SerializerResult<()> {
        let start = self.position();
        let len = self.length(value.len(), 0)?;
        let empty_run = |len: usize| {
            if len > MAX_EMPTY_ELEMENTS {
                Err(SerializerError::format(
                    start,
                    format!("{len} zero-width elements exceed the limit of {MAX_EMPTY_ELEMENTS}"),
                ))
            } else {
                Ok(())
            }
        };

        if self.is_reading() {
            value.clear();
            value.reserve(len.min(self.remaining()));
            while value.len() < len {
                let before = self.position();
                let mut element = T::default();
                element.serialize(self)?;
                value.push(element);
                if self.position() == before {
                    empty_run(len)?;
                    value.resize_with(len, T::default);
                }
            }
        } else {
            for element in value.iter_mut() {
                let before = self.position();
                element.serialize(self)?;
                if self.position() == before {
                    empty_run(len)?;
                }
            }
        }
        Ok(())
    }

    /// Nested value behind a presence byte.
    pub fn optional<T: Serializable>(&mut self, value: &mut Option<T>) -> SerializerResult<()> {
        let mut present = value.is_some();
        self.bool(&mut present)?;
        if present {
            value.get_or_insert_with(T::default).serialize(self)
        } else {
            *value = None;
            Ok(())
        }
    }

    // ---------------------------------------------------------------
    // Identifiers and references
    // ---------------------------------------------------------------

    pub fn hash(&mut self, value: &mut ContentHash) -> SerializerResult<()> {
        *value = ContentHash::from_hash(self.fixed(*value.as_bytes())?);
        Ok(())
    }

    /// Optional GUID; zero encodes "none".
    pub fn guid(&mut self, value: &mut Option<Guid>) -> SerializerResult<()> {
        let mut raw = value.map_or(0, |guid| guid.0);
        self.u32(&mut raw)?;
        *value = (raw != 0).then_some(Guid(raw));
        Ok(())
    }

    /// Reference to another resource.
    ///
    /// Wire form: a kind byte (none, hash or GUID), the key, and for `typed`
    /// references the resource type. Non-empty references are recorded in the
    /// pass's dependency set.
    pub fn resource(
        &mut self,
        value: &mut Option<ResourceDescriptor>,
        resource_type: ResourceType,
        typed: bool,
    ) -> SerializerResult<()> {
        let (hash_kind, guid_kind) = if self.revision.version <= SWAPPED_REFERENCE_KINDS_MAX {
            (2u8, 1u8)
        } else {
            (1u8, 2u8)
        };
        let start = self.position();
        let mut kind = match value.map(|desc| desc.key) {
            None => 0,
            Some(ResourceKey::Hash(_)) => hash_kind,
            Some(ResourceKey::Guid(_)) => guid_kind,
        };
        self.u8(&mut kind)?;

        let key = if kind == 0 {
            None
        } else if kind == hash_kind {
            let mut hash = value.and_then(|desc| desc.hash()).unwrap_or_default();
            self.hash(&mut hash)?;
            Some(ResourceKey::Hash(hash))
        } else if kind == guid_kind {
            let mut guid = value.and_then(|desc| desc.guid()).map_or(0, |guid| guid.0);
            self.u32(&mut guid)?;
            Some(ResourceKey::Guid(Guid(guid)))
        } else {
            return Err(SerializerError::format(
                start,
                format!("unknown reference kind {kind}"),
            ));
        };

        let Some(key) = key else {
            *value = None;
            return Ok(());
        };

        let mut ty = value.map_or(resource_type, |desc| desc.resource_type);
        if typed {
            let type_start = self.position();
            let raw = if self.revision.version >= WIDE_REFERENCE_TYPE_MIN {
                let mut raw = ty.value() as u16;
                self.u16(&mut raw)?;
                u32::from(raw)
            } else {
                let mut raw = ty.value() as u8;
                self.u8(&mut raw)?;
                u32::from(raw)
            };
            ty = ResourceType::from_value(raw)
                .map_err(|e| SerializerError::format(type_start, e.to_string()))?;
        } else {
            ty = resource_type;
        }

        let descriptor = ResourceDescriptor {
            resource_type: ty,
            key,
        };
        self.graph.add_dependency(descriptor);
        *value = Some(descriptor);
        Ok(())
    }

    /// Identity-preserving reference into an arena of shared objects.
    ///
    /// `target` is the arena index being written (ignored when decoding) and
    /// `arena_len` the current arena length. On [`Visit::First`] the caller
    /// transfers the object's payload, allocating the index first when
    /// decoding.
    pub fn reference(&mut self, target: Option<usize>, arena_len: usize) -> SerializerResult<Visit> {
        let start = self.position();
        match self.direction() {
            Direction::Encode => {
                let Some(index) = target else {
                    self.u32(&mut 0)?;
                    return Ok(Visit::Null);
                };
                if index >= arena_len {
                    return Err(SerializerError::format(
                        start,
                        format!("reference {index} outside arena of {arena_len}"),
                    ));
                }
                let visit = match self.graph.slot_of(index) {
                    Some(_) => Visit::Seen(index),
                    None => Visit::First(index),
                };
                let mut slot = self.graph.assign(index);
                self.u32(&mut slot)?;
                Ok(visit)
            }
            Direction::Decode => {
                let mut slot = 0u32;
                self.u32(&mut slot)?;
                if slot == 0 {
                    return Ok(Visit::Null);
                }
                if let Some(index) = self.graph.resolve(slot) {
                    return Ok(Visit::Seen(index));
                }
                self.graph.register(slot, arena_len);
                Ok(Visit::First(arena_len))
            }
        }
    }
}

fn check_revision(revision: Revision) -> SerializerResult<()> {
    revision
        .validate()
        .map(|_| ())
        .map_err(|source| SerializerError::UnsupportedRevision { revision, source })
}

impl std::fmt::Debug for Serializer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("direction", &self.direction())
            .field("revision", &self.revision)
            .field("compression", &self.compression)
            .field("position", &self.position())
            .finish()
    }
}
