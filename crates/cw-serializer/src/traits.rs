use crate::error::SerializerResult;
use crate::serializer::Serializer;

/// A type whose binary layout is described once and serves both directions.
///
/// Implementations call the symmetric accessors on [`Serializer`] for every
/// field in declared order, guarding revision-dependent fields with
/// [`Serializer::gated`]. When decoding, `self` starts as `Default::default()`
/// and is overwritten field by field.
pub trait Serializable: Default {
    /// Initial output buffer capacity for one encoded value.
    const BASE_ALLOCATION_SIZE: usize = 0x10;

    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()>;
}

/// A serializable type that is stored as a standalone resource.
pub trait Resource: Serializable {
    const RESOURCE_TYPE: cw_types::ResourceType;
}
