//! Standalone resource files.
//!
//! Layout, big-endian:
//!
//! ```text
//! [magic: 3 ASCII bytes]['b']
//! [revision record: version u32, sub_version u32, branch_id u16]
//! [dependency table offset: u32]
//! [payload: compression flags u8, fields...]
//! [dependency table: count u32, {kind u8, hash[20] | guid u32, type u32}...]
//! ```
//!
//! The dependency table offset is absolute from the start of the file.

use cw_types::{
    CompressionFlags, ContentHash, Guid, ResourceDescriptor, ResourceKey, ResourceType, Revision,
};
use tracing::debug;

use crate::codec;
use crate::error::{SerializerError, SerializerResult};
use crate::traits::Resource;

/// Binary payload marker following the type magic.
const BINARY_MARKER: u8 = b'b';

const HEADER_LEN: usize = 4 + Revision::RECORD_LEN + 4;

const DEPENDENCY_KIND_HASH: u8 = 1;
const DEPENDENCY_KIND_GUID: u8 = 2;

/// A parsed resource file: header, raw payload and dependency table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceFile {
    pub resource_type: ResourceType,
    pub revision: Revision,
    /// `[compression flags][fields...]`, decodable with [`codec::deserialize`].
    pub payload: Vec<u8>,
    pub dependencies: Vec<ResourceDescriptor>,
}

impl ResourceFile {
    /// Parse the container framing without decoding the payload.
    pub fn parse(data: &[u8]) -> SerializerResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(SerializerError::format(
                data.len(),
                format!("resource file shorter than {HEADER_LEN}-byte header"),
            ));
        }
        let resource_type = ResourceType::from_magic(&data[0..3]).ok_or_else(|| {
            SerializerError::Container(format!(
                "unknown resource magic {:?}",
                String::from_utf8_lossy(&data[0..3])
            ))
        })?;
        if data[3] != BINARY_MARKER {
            return Err(SerializerError::Container(format!(
                "unsupported payload marker {:?}",
                data[3] as char
            )));
        }
        let revision = Revision::from_bytes(&data[4..4 + Revision::RECORD_LEN])
            .map_err(|e| SerializerError::format(4, e.to_string()))?;

        let offset_pos = 4 + Revision::RECORD_LEN;
        let table_offset = read_u32(data, offset_pos)? as usize;
        if table_offset < HEADER_LEN || table_offset > data.len() {
            return Err(SerializerError::format(
                offset_pos,
                format!("dependency table offset {table_offset} outside file"),
            ));
        }
        let payload = data[HEADER_LEN..table_offset].to_vec();
        let dependencies = read_dependencies(data, table_offset)?;

        Ok(Self {
            resource_type,
            revision,
            payload,
            dependencies,
        })
    }

    /// Frame the payload and dependency table.
    pub fn to_bytes(&self) -> SerializerResult<Vec<u8>> {
        let magic = self.resource_type.magic().ok_or_else(|| {
            SerializerError::Container(format!(
                "{:?} has no container form",
                self.resource_type
            ))
        })?;
        let table_offset = u32::try_from(HEADER_LEN + self.payload.len())
            .map_err(|_| SerializerError::Container("payload exceeds 4 GiB".into()))?;

        let mut buf = Vec::with_capacity(table_offset as usize + 4 + self.dependencies.len() * 25);
        buf.extend_from_slice(magic);
        buf.push(BINARY_MARKER);
        buf.extend_from_slice(&self.revision.to_bytes());
        buf.extend_from_slice(&table_offset.to_be_bytes());
        buf.extend_from_slice(&self.payload);

        buf.extend_from_slice(&(self.dependencies.len() as u32).to_be_bytes());
        for dependency in &self.dependencies {
            match dependency.key {
                ResourceKey::Hash(hash) => {
                    buf.push(DEPENDENCY_KIND_HASH);
                    buf.extend_from_slice(hash.as_bytes());
                }
                ResourceKey::Guid(guid) => {
                    buf.push(DEPENDENCY_KIND_GUID);
                    buf.extend_from_slice(&guid.0.to_be_bytes());
                }
            }
            buf.extend_from_slice(&dependency.resource_type.value().to_be_bytes());
        }
        Ok(buf)
    }

    /// Compression flags recorded in the payload's first byte.
    pub fn compression(&self) -> SerializerResult<CompressionFlags> {
        let bits = *self
            .payload
            .first()
            .ok_or_else(|| SerializerError::format(HEADER_LEN, "empty payload"))?;
        CompressionFlags::from_bits(bits).map_err(|e| SerializerError::format(HEADER_LEN, e.to_string()))
    }

    /// Decode the payload as `T`, checking the resource type.
    pub fn decode<T: Resource>(&self) -> SerializerResult<T> {
        if self.resource_type != T::RESOURCE_TYPE {
            return Err(SerializerError::Container(format!(
                "expected {:?} resource, found {:?}",
                T::RESOURCE_TYPE,
                self.resource_type
            )));
        }
        codec::deserialize(&self.payload, self.revision)
    }
}

/// Encode `value` as a standalone resource file.
pub fn encode_resource<T: Resource>(
    value: &mut T,
    revision: Revision,
    compression: CompressionFlags,
) -> SerializerResult<Vec<u8>> {
    let encoded = codec::encode(value, revision, compression)?;
    debug!(
        resource_type = ?T::RESOURCE_TYPE,
        payload = encoded.bytes.len(),
        dependencies = encoded.dependencies.len(),
        "framing resource"
    );
    ResourceFile {
        resource_type: T::RESOURCE_TYPE,
        revision,
        payload: encoded.bytes,
        dependencies: encoded.dependencies,
    }
    .to_bytes()
}

/// Decode a standalone resource file, returning the value and its framing.
pub fn decode_resource<T: Resource>(data: &[u8]) -> SerializerResult<(T, ResourceFile)> {
    let file = ResourceFile::parse(data)?;
    let value = file.decode()?;
    Ok((value, file))
}

fn read_u32(data: &[u8], pos: usize) -> SerializerResult<u32> {
    data.get(pos..pos + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| SerializerError::format(pos, "truncated u32"))
}

fn read_dependencies(data: &[u8], mut pos: usize) -> SerializerResult<Vec<ResourceDescriptor>> {
    let count = read_u32(data, pos)? as usize;
    pos += 4;
    // Smallest entry: kind + guid + type.
    if count.saturating_mul(9) > data.len() - pos {
        return Err(SerializerError::format(
            pos - 4,
            format!("dependency count {count} exceeds remaining bytes"),
        ));
    }

    let mut dependencies = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = *data
            .get(pos)
            .ok_or_else(|| SerializerError::format(pos, "truncated dependency"))?;
        pos += 1;
        let key = match kind {
            DEPENDENCY_KIND_HASH => {
                let bytes = data
                    .get(pos..pos + ContentHash::LEN)
                    .ok_or_else(|| SerializerError::format(pos, "truncated dependency hash"))?;
                pos += ContentHash::LEN;
                ResourceKey::Hash(
                    ContentHash::from_slice(bytes)
                        .map_err(|e| SerializerError::format(pos, e.to_string()))?,
                )
            }
            DEPENDENCY_KIND_GUID => {
                let guid = read_u32(data, pos)?;
                pos += 4;
                ResourceKey::Guid(Guid(guid))
            }
            other => {
                return Err(SerializerError::format(
                    pos - 1,
                    format!("unknown dependency kind {other}"),
                ))
            }
        };
        let resource_type = ResourceType::from_value(read_u32(data, pos)?)
            .map_err(|e| SerializerError::format(pos, e.to_string()))?;
        pos += 4;
        dependencies.push(ResourceDescriptor { resource_type, key });
    }
    if pos != data.len() {
        return Err(SerializerError::format(pos, "trailing bytes after dependency table"));
    }
    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::Serializer;
    use crate::traits::Serializable;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Palette {
        colors: Vec<u32>,
        texture: Option<ResourceDescriptor>,
    }

    impl Serializable for Palette {
        fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
            s.u32_array(&mut self.colors)?;
            s.resource(&mut self.texture, ResourceType::Texture, false)
        }
    }

    impl Resource for Palette {
        const RESOURCE_TYPE: ResourceType = ResourceType::Palette;
    }

    #[derive(Clone, Debug, Default)]
    struct Other;

    impl Serializable for Other {
        fn serialize(&mut self, _: &mut Serializer<'_>) -> SerializerResult<()> {
            Ok(())
        }
    }

    impl Resource for Other {
        const RESOURCE_TYPE: ResourceType = ResourceType::Plan;
    }

    fn palette() -> Palette {
        Palette {
            colors: vec![0xFF00_00FF, 0x00FF_00FF],
            texture: Some(ResourceDescriptor::from_guid(ResourceType::Texture, Guid(77))),
        }
    }

    #[test]
    fn resource_file_roundtrip() {
        let revision = Revision::default();
        let bytes = encode_resource(&mut palette(), revision, CompressionFlags::ALL).unwrap();
        assert_eq!(&bytes[0..4], b"PALb");

        let (value, file): (Palette, _) = decode_resource(&bytes).unwrap();
        assert_eq!(value, palette());
        assert_eq!(file.revision, revision);
        assert_eq!(file.compression().unwrap(), CompressionFlags::ALL);
        assert_eq!(
            file.dependencies,
            vec![ResourceDescriptor::from_guid(ResourceType::Texture, Guid(77))]
        );
        assert_eq!(file.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn wrong_resource_type_is_rejected() {
        let bytes =
            encode_resource(&mut palette(), Revision::default(), CompressionFlags::NONE).unwrap();
        let err = decode_resource::<Other>(&bytes).unwrap_err();
        assert!(matches!(err, SerializerError::Container(_)));
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let mut bytes =
            encode_resource(&mut palette(), Revision::default(), CompressionFlags::NONE).unwrap();
        bytes[0..3].copy_from_slice(b"ZZZ");
        assert!(matches!(
            ResourceFile::parse(&bytes),
            Err(SerializerError::Container(_))
        ));
    }

    #[test]
    fn table_offset_outside_file_is_format_error() {
        let mut bytes =
            encode_resource(&mut palette(), Revision::default(), CompressionFlags::NONE).unwrap();
        bytes[14..18].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = ResourceFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, SerializerError::Format { offset: 14, .. }));
    }

    #[test]
    fn truncated_dependency_table_is_format_error() {
        let bytes =
            encode_resource(&mut palette(), Revision::default(), CompressionFlags::NONE).unwrap();
        let err = ResourceFile::parse(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn short_file_is_format_error() {
        assert!(ResourceFile::parse(b"PALb").unwrap_err().is_format_error());
    }
}
