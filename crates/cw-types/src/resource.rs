use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::ContentHash;

/// Compact integer identifier assigned to shipped resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub u32);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Kind of a serialized resource.
///
/// Each type has a stable numeric id (used in dependency tables) and a
/// three-letter magic (used in resource container headers).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    #[default]
    Invalid,
    Texture,
    Mesh,
    Pixmap,
    GfxMaterial,
    Animation,
    Level,
    Plan,
    Script,
    Material,
    Palette,
}

impl ResourceType {
    pub const ALL: [ResourceType; 11] = [
        ResourceType::Invalid,
        ResourceType::Texture,
        ResourceType::Mesh,
        ResourceType::Pixmap,
        ResourceType::GfxMaterial,
        ResourceType::Animation,
        ResourceType::Level,
        ResourceType::Plan,
        ResourceType::Script,
        ResourceType::Material,
        ResourceType::Palette,
    ];

    pub const fn value(self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::Texture => 1,
            Self::Mesh => 2,
            Self::Pixmap => 3,
            Self::GfxMaterial => 4,
            Self::Animation => 5,
            Self::Level => 9,
            Self::Plan => 10,
            Self::Script => 17,
            Self::Material => 19,
            Self::Palette => 28,
        }
    }

    /// Three-byte header magic; `None` for types without a container form.
    pub const fn magic(self) -> Option<&'static [u8; 3]> {
        match self {
            Self::Invalid => None,
            Self::Texture => Some(b"TEX"),
            Self::Mesh => Some(b"MSH"),
            Self::Pixmap => Some(b"PIX"),
            Self::GfxMaterial => Some(b"GMT"),
            Self::Animation => Some(b"ANM"),
            Self::Level => Some(b"LVL"),
            Self::Plan => Some(b"PLN"),
            Self::Script => Some(b"FSH"),
            Self::Material => Some(b"MAT"),
            Self::Palette => Some(b"PAL"),
        }
    }

    pub fn from_value(value: u32) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.value() == value)
            .ok_or(TypeError::UnknownResourceType(value))
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.magic().is_some_and(|m| m.as_slice() == magic))
    }
}

/// How a descriptor names its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKey {
    Hash(ContentHash),
    Guid(Guid),
}

/// Typed reference to another resource.
///
/// Descriptors are resolved lazily by consumers (for example through a file
/// database lookup); the codec never materializes the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,
    pub key: ResourceKey,
}

impl ResourceDescriptor {
    pub fn from_hash(resource_type: ResourceType, hash: ContentHash) -> Self {
        Self {
            resource_type,
            key: ResourceKey::Hash(hash),
        }
    }

    pub fn from_guid(resource_type: ResourceType, guid: Guid) -> Self {
        Self {
            resource_type,
            key: ResourceKey::Guid(guid),
        }
    }

    pub fn hash(&self) -> Option<ContentHash> {
        match self.key {
            ResourceKey::Hash(hash) => Some(hash),
            ResourceKey::Guid(_) => None,
        }
    }

    pub fn guid(&self) -> Option<Guid> {
        match self.key {
            ResourceKey::Guid(guid) => Some(guid),
            ResourceKey::Hash(_) => None,
        }
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            ResourceKey::Hash(hash) => write!(f, "{:?}:h{}", self.resource_type, hash),
            ResourceKey::Guid(guid) => write!(f, "{:?}:{}", self.resource_type, guid),
        }
    }
}
