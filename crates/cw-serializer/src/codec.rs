//! Top-level entry points.
//!
//! Each call builds its own [`Serializer`] and therefore its own identity
//! registry, so concurrent callers never share state.

use cw_types::{CompressionFlags, ResourceDescriptor, Revision};
use tracing::debug;

use crate::error::{SerializerError, SerializerResult};
use crate::serializer::Serializer;
use crate::traits::Serializable;

/// Output of one encode pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    /// `[compression flags][fields...]`.
    pub bytes: Vec<u8>,
    /// Every resource referenced by the value, sorted and deduplicated.
    pub dependencies: Vec<ResourceDescriptor>,
}

/// Encode `value` at `revision`, collecting its dependencies.
///
/// Encoding never changes field values, but it takes `&mut` because the
/// accessors are shared with decoding.
pub fn encode<T: Serializable>(
    value: &mut T,
    revision: Revision,
    compression: CompressionFlags,
) -> SerializerResult<Encoded> {
    debug!(%revision, flags = compression.bits(), "encoding value");
    let mut s = Serializer::writer(revision, compression, T::BASE_ALLOCATION_SIZE)?;
    value.serialize(&mut s)?;
    let (bytes, graph) = s.finish();
    Ok(Encoded {
        bytes,
        dependencies: graph.into_dependencies(),
    })
}

/// Encode a copy of `value` at `revision`.
pub fn serialize<T: Serializable + Clone>(
    value: &T,
    revision: Revision,
    compression: CompressionFlags,
) -> SerializerResult<Vec<u8>> {
    encode(&mut value.clone(), revision, compression).map(|encoded| encoded.bytes)
}

/// Decode a `T` laid out for `revision`, with its dependencies.
///
/// The payload must be consumed exactly. On any error the partially decoded
/// value is dropped.
pub fn decode<T: Serializable>(
    bytes: &[u8],
    revision: Revision,
) -> SerializerResult<(T, Vec<ResourceDescriptor>)> {
    debug!(%revision, len = bytes.len(), "decoding value");
    let mut s = Serializer::reader(bytes, revision)?;
    let mut value = T::default();
    value.serialize(&mut s)?;
    if s.remaining() != 0 {
        return Err(s.error(format!("{} trailing bytes after value", s.remaining())));
    }
    let (_, graph) = s.finish();
    Ok((value, graph.into_dependencies()))
}

/// Decode a `T` laid out for `revision`.
pub fn deserialize<T: Serializable>(bytes: &[u8], revision: Revision) -> SerializerResult<T> {
    decode(bytes, revision).map(|(value, _)| value)
}

/// Serialize, deserialize and re-serialize `value`, failing with
/// [`SerializerError::Consistency`] when the two encodings differ.
///
/// Returns the verified encoding.
pub fn verify<T: Serializable + Clone>(
    value: &T,
    revision: Revision,
    compression: CompressionFlags,
) -> SerializerResult<Vec<u8>> {
    let first = serialize(value, revision, compression)?;
    let mut decoded: T = deserialize(&first, revision)?;
    let second = encode(&mut decoded, revision, compression)?.bytes;
    if first != second {
        let offset = first
            .iter()
            .zip(second.iter())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| first.len().min(second.len()));
        return Err(SerializerError::Consistency {
            offset,
            expected: first.len(),
            actual: second.len(),
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{include, FieldRule};
    use crate::serializer::MAX_EMPTY_ELEMENTS;
    use cw_types::{ContentHash, Guid, ResourceType};
    use glam::{Mat4, Quat, Vec3, Vec4};
    use proptest::prelude::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Gated {
        a: u32,
        b: u32,
    }

    const A_RULES: &[FieldRule] = &[FieldRule::min(0x272)];
    const B_RULES: &[FieldRule] = &[FieldRule::min(0x398)];

    impl Serializable for Gated {
        fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
            s.gated(A_RULES, |s| s.u32(&mut self.a))?;
            s.gated(B_RULES, |s| s.u32(&mut self.b))
        }
    }

    impl Gated {
        /// The value a decoder sees at `revision`: absent fields stay default.
        fn at(&self, revision: &Revision) -> Self {
            Self {
                a: if include(A_RULES, revision) { self.a } else { 0 },
                b: if include(B_RULES, revision) { self.b } else { 0 },
            }
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct GatedList {
        items: Vec<Gated>,
    }

    impl Serializable for GatedList {
        fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
            s.array(&mut self.items)
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Sample {
        flag: bool,
        small: i16,
        count: u32,
        delta: i32,
        stamp: u64,
        offset: i64,
        weight: f32,
        color: Vec4,
        transform: Mat4,
        name: String,
        blob: Vec<u8>,
        indices: Vec<u32>,
        children: Vec<Gated>,
        extra: Option<Gated>,
        mesh: Option<ResourceDescriptor>,
        plan: Option<ResourceDescriptor>,
    }

    impl Serializable for Sample {
        const BASE_ALLOCATION_SIZE: usize = 0x100;

        fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
            s.bool(&mut self.flag)?;
            s.i16(&mut self.small)?;
            s.u32(&mut self.count)?;
            s.i32(&mut self.delta)?;
            s.u64(&mut self.stamp)?;
            s.i64(&mut self.offset)?;
            s.f32(&mut self.weight)?;
            s.v4(&mut self.color)?;
            s.m44(&mut self.transform)?;
            s.str(&mut self.name)?;
            s.bytes(&mut self.blob)?;
            s.u32_array(&mut self.indices)?;
            s.array(&mut self.children)?;
            s.optional(&mut self.extra)?;
            s.resource(&mut self.mesh, ResourceType::Mesh, false)?;
            s.resource(&mut self.plan, ResourceType::Plan, true)
        }
    }

    impl Sample {
        fn at(&self, revision: &Revision) -> Self {
            Self {
                children: self.children.iter().map(|child| child.at(revision)).collect(),
                extra: self.extra.as_ref().map(|extra| extra.at(revision)),
                ..self.clone()
            }
        }
    }

    fn sample() -> Sample {
        Sample {
            flag: true,
            small: -12,
            count: 70_000,
            delta: -5,
            stamp: 1 << 40,
            offset: -(1 << 33),
            weight: 0.25,
            color: Vec4::new(1.0, 0.5, 0.25, 1.0),
            transform: Mat4::from_scale_rotation_translation(
                Vec3::splat(2.0),
                Quat::from_rotation_y(0.5),
                Vec3::new(1.0, 2.0, 3.0),
            ),
            name: "podium".into(),
            blob: vec![1, 2, 3, 4, 5],
            indices: vec![0, 1, 300, u32::MAX],
            children: vec![Gated { a: 1, b: 2 }, Gated { a: 3, b: 4 }],
            extra: Some(Gated { a: 9, b: 10 }),
            mesh: Some(ResourceDescriptor::from_hash(
                ResourceType::Mesh,
                ContentHash::from_bytes(b"mesh"),
            )),
            plan: Some(ResourceDescriptor::from_guid(ResourceType::Plan, Guid(0x1000))),
        }
    }

    #[test]
    fn gated_field_absent_before_its_revision() {
        let value = Gated { a: 0xAAAA_AAAA, b: 0xBBBB_BBBB };
        let bytes = serialize(&value, Revision::head(0x300), CompressionFlags::NONE).unwrap();
        assert_eq!(bytes, [0, 0xAA, 0xAA, 0xAA, 0xAA]);

        let decoded: Gated = deserialize(&bytes, Revision::head(0x300)).unwrap();
        assert_eq!(decoded, Gated { a: 0xAAAA_AAAA, b: 0 });
    }

    #[test]
    fn gated_fields_in_declared_order() {
        let value = Gated { a: 0xAAAA_AAAA, b: 0xBBBB_BBBB };
        let bytes = serialize(&value, Revision::head(0x400), CompressionFlags::NONE).unwrap();
        assert_eq!(bytes, [0, 0xAA, 0xAA, 0xAA, 0xAA, 0xBB, 0xBB, 0xBB, 0xBB]);
        assert_eq!(deserialize::<Gated>(&bytes, Revision::head(0x400)).unwrap(), value);
    }

    #[test]
    fn roundtrip_across_revisions() {
        let revisions = [
            Revision::head(0x18b),
            Revision::head(0x272),
            Revision::head(0x3f8),
            cw_types::Branch::Leerdammer.revision(),
            cw_types::Branch::Mizuki.revision(),
        ];
        for revision in revisions {
            for flags in [CompressionFlags::NONE, CompressionFlags::ALL] {
                let value = sample();
                let bytes = serialize(&value, revision, flags).unwrap();
                let decoded: Sample = deserialize(&bytes, revision).unwrap();
                assert_eq!(decoded, value.at(&revision), "{revision} flags {flags:?}");
            }
        }
    }

    #[test]
    fn early_revisions_drop_gated_children() {
        let revision = Revision::head(0x18b);
        let bytes = serialize(&sample(), revision, CompressionFlags::NONE).unwrap();
        let decoded: Sample = deserialize(&bytes, revision).unwrap();
        assert_eq!(decoded.children, vec![Gated::default(); 2]);
        assert_eq!(decoded.extra, Some(Gated::default()));
    }

    #[test]
    fn zero_width_elements_roundtrip() {
        let revision = Revision::head(0x18b);
        let list = GatedList {
            items: vec![Gated::default(); 3],
        };
        let plain = serialize(&list, revision, CompressionFlags::NONE).unwrap();
        assert_eq!(plain, [0, 0, 0, 0, 3]);
        assert_eq!(deserialize::<GatedList>(&plain, revision).unwrap(), list);

        let packed = serialize(&list, revision, CompressionFlags::ALL).unwrap();
        assert_eq!(deserialize::<GatedList>(&packed, revision).unwrap(), list);
    }

    #[test]
    fn zero_width_run_is_capped() {
        let revision = Revision::head(0x18b);
        let mut bytes = vec![0];
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        let err = deserialize::<GatedList>(&bytes, revision).unwrap_err();
        assert!(err.is_format_error());

        let list = GatedList {
            items: vec![Gated::default(); MAX_EMPTY_ELEMENTS + 1],
        };
        assert!(serialize(&list, revision, CompressionFlags::NONE).is_err());
    }

    #[test]
    fn sized_elements_still_bound_the_prefix() {
        let revision = Revision::head(0x400);
        let mut bytes = vec![0];
        bytes.extend_from_slice(&1000i32.to_be_bytes());
        bytes.extend_from_slice(&[0; 8]);
        let err = deserialize::<GatedList>(&bytes, revision).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn compression_changes_bytes_not_values() {
        let revision = Revision::default();
        let plain = serialize(&sample(), revision, CompressionFlags::NONE).unwrap();
        let packed = serialize(&sample(), revision, CompressionFlags::ALL).unwrap();
        assert!(packed.len() < plain.len());

        let a: Sample = deserialize(&plain, revision).unwrap();
        let b: Sample = deserialize(&packed, revision).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn encode_collects_dependencies() {
        let encoded = encode(&mut sample(), Revision::default(), CompressionFlags::ALL).unwrap();
        assert_eq!(encoded.dependencies.len(), 2);
        let (_, deps) = decode::<Sample>(&encoded.bytes, Revision::default()).unwrap();
        assert_eq!(deps, encoded.dependencies);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = serialize(&Gated::default(), Revision::head(0x400), CompressionFlags::NONE)
            .unwrap();
        bytes.push(0);
        let err = deserialize::<Gated>(&bytes, Revision::head(0x400)).unwrap_err();
        assert!(matches!(err, SerializerError::Format { offset: 9, .. }));
    }

    #[test]
    fn truncated_payload_is_format_error() {
        let bytes = serialize(&sample(), Revision::default(), CompressionFlags::NONE).unwrap();
        for cut in [1, bytes.len() / 2, bytes.len() - 1] {
            let err = deserialize::<Sample>(&bytes[..cut], Revision::default()).unwrap_err();
            assert!(err.is_format_error(), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn bad_branch_head_is_rejected() {
        let revision = Revision::new(0x300, 1, cw_types::Branch::Leerdammer.id());
        let err = serialize(&Gated::default(), revision, CompressionFlags::NONE).unwrap_err();
        assert!(err.is_format_error());
        let err = deserialize::<Gated>(&[0], revision).unwrap_err();
        assert!(matches!(err, SerializerError::UnsupportedRevision { .. }));
    }

    #[test]
    fn verify_accepts_stable_value() {
        let bytes = verify(&sample(), Revision::default(), CompressionFlags::ALL).unwrap();
        assert_eq!(bytes, serialize(&sample(), Revision::default(), CompressionFlags::ALL).unwrap());
    }

    #[derive(Clone, Debug, Default)]
    struct Unstable {
        generation: u32,
    }

    impl Serializable for Unstable {
        fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
            s.u32(&mut self.generation)?;
            if s.is_reading() {
                self.generation += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn verify_reports_divergence() {
        let err = verify(&Unstable::default(), Revision::default(), CompressionFlags::NONE)
            .unwrap_err();
        assert_eq!(
            err,
            SerializerError::Consistency {
                offset: 4,
                expected: 5,
                actual: 5
            }
        );
    }

    proptest! {
        #[test]
        fn compression_equivalence(a in any::<u32>(), b in any::<u32>(), delta in any::<i32>(), stamp in any::<u64>()) {
            let value = Sample {
                count: a,
                delta,
                stamp,
                indices: vec![a, b],
                children: vec![Gated { a, b }],
                ..Sample::default()
            };
            let revision = Revision::default();
            for flags in 0..=7u8 {
                let flags = CompressionFlags::from_bits(flags).unwrap();
                let bytes = serialize(&value, revision, flags).unwrap();
                prop_assert_eq!(deserialize::<Sample>(&bytes, revision).unwrap(), value.clone());
            }
        }
    }
}
