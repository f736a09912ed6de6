use cw_resources::{GfxMaterialHeader, Level};
use cw_serializer::ResourceFile;
use cw_types::{ResourceDescriptor, ResourceType, Revision};
use serde::Serialize;

use crate::error::{SdkError, SdkResult};

/// A resource file decoded into whichever layout its header names.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum DecodedResource {
    Level(Level),
    GfxMaterial(GfxMaterialHeader),
}

impl DecodedResource {
    /// Decode a parsed resource file by its header type.
    pub fn from_file(file: &ResourceFile) -> SdkResult<Self> {
        match file.resource_type {
            ResourceType::Level => Ok(Self::Level(file.decode()?)),
            ResourceType::GfxMaterial => Ok(Self::GfxMaterial(file.decode()?)),
            other => Err(SdkError::UnsupportedResource(other)),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Level(_) => ResourceType::Level,
            Self::GfxMaterial(_) => ResourceType::GfxMaterial,
        }
    }
}

/// Header summary plus the decoded value, as rendered by tooling.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceReport {
    pub revision: Revision,
    pub compression: u8,
    pub dependencies: Vec<ResourceDescriptor>,
    pub resource: DecodedResource,
}

impl ResourceReport {
    pub fn to_json(&self) -> SdkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
