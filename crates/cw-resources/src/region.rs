use cw_serializer::{FieldRule, Serializable, Serializer, SerializerResult};
use cw_types::{ResourceDescriptor, ResourceType};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Tint and brightness are stored from this sub-version on.
const TINT_RULES: &[FieldRule] = &[FieldRule::min(0x158).sub_version()];

/// Per-region material replacement on a mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionOverride {
    pub region: i32,
    pub material_plan: Option<ResourceDescriptor>,
    pub material: Option<ResourceDescriptor>,
    pub uv_scale: Vec3,
    pub color: i32,
    pub brightness: i8,
}

impl Default for RegionOverride {
    fn default() -> Self {
        Self {
            region: 0,
            material_plan: None,
            material: None,
            uv_scale: Vec3::ONE,
            color: -1,
            brightness: 0,
        }
    }
}

impl Serializable for RegionOverride {
    const BASE_ALLOCATION_SIZE: usize = 0x80;

    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
        s.i32(&mut self.region)?;
        s.resource(&mut self.material_plan, ResourceType::Plan, true)?;
        s.resource(&mut self.material, ResourceType::GfxMaterial, false)?;
        s.v3(&mut self.uv_scale)?;
        s.gated(TINT_RULES, |s| {
            s.i32(&mut self.color)?;
            s.i8(&mut self.brightness)
        })
    }
}
