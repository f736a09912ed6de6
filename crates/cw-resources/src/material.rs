use cw_serializer::{FieldRule, Resource, Serializable, Serializer, SerializerResult};
use cw_types::{ResourceDescriptor, ResourceType};
use serde::{Deserialize, Serialize};

/// Number of texture samplers a material binds.
pub const TEXTURE_SLOTS: usize = 8;

const ALPHA_MODE_RULES: &[FieldRule] = &[FieldRule::min(0x332)];
const FRESNEL_RULES: &[FieldRule] = &[FieldRule::packed_min(0x130, 0x3f0)];
const FUZZ_RULES: &[FieldRule] = &[FieldRule::packed_min(0x177, 0x3f0)];
const SOUND_RULES: &[FieldRule] = &[FieldRule::min(0x129)];

/// Fresnel terms stored on newer sub-versions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Refraction {
    pub falloff_power: f32,
    pub multiplier: f32,
    pub offset: f32,
    pub shift: f32,
    pub fuzz_length_and_refractive_flag: u8,
}

impl Serializable for Refraction {
    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
        s.f32(&mut self.falloff_power)?;
        s.f32(&mut self.multiplier)?;
        s.f32(&mut self.offset)?;
        s.f32(&mut self.shift)?;
        s.u8(&mut self.fuzz_length_and_refractive_flag)
    }
}

/// Fuzz shading terms stored on newer sub-versions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fuzz {
    pub translucency_density: u8,
    pub swirl_angle: u8,
    pub swirl_amplitude: u8,
    pub lighting_bias: u8,
    pub lighting_scale: u8,
    pub iridescence_roughness: u8,
}

impl Serializable for Fuzz {
    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
        s.u8(&mut self.translucency_density)?;
        s.u8(&mut self.swirl_angle)?;
        s.u8(&mut self.swirl_amplitude)?;
        s.u8(&mut self.lighting_bias)?;
        s.u8(&mut self.lighting_scale)?;
        s.u8(&mut self.iridescence_roughness)
    }
}

/// Render state and texture bindings of a graphics material.
///
/// Shader programs and the node graph that produced them are not part of
/// this layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GfxMaterialHeader {
    pub flags: i32,
    pub alpha_test_level: f32,
    pub alpha_layer: i8,
    pub alpha_mode: i8,
    pub shadow_cast_mode: i8,
    pub bump_level: f32,
    pub cosine_power: f32,
    pub reflection_blur: f32,
    pub refractive_index: f32,
    pub refraction: Refraction,
    pub fuzz: Fuzz,
    pub textures: [Option<ResourceDescriptor>; TEXTURE_SLOTS],
    pub wrap_s: Vec<u8>,
    pub wrap_t: Vec<u8>,
    pub sound_enum: i32,
}

impl GfxMaterialHeader {
    /// Bound textures with their slot index.
    pub fn bound_textures(&self) -> impl Iterator<Item = (usize, &ResourceDescriptor)> {
        self.textures
            .iter()
            .enumerate()
            .filter_map(|(slot, texture)| texture.as_ref().map(|t| (slot, t)))
    }
}

impl Serializable for GfxMaterialHeader {
    const BASE_ALLOCATION_SIZE: usize = 0x200;

    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
        s.i32(&mut self.flags)?;
        s.f32(&mut self.alpha_test_level)?;
        s.i8(&mut self.alpha_layer)?;
        s.gated(ALPHA_MODE_RULES, |s| s.i8(&mut self.alpha_mode))?;
        s.i8(&mut self.shadow_cast_mode)?;
        s.f32(&mut self.bump_level)?;
        s.f32(&mut self.cosine_power)?;
        s.f32(&mut self.reflection_blur)?;
        s.f32(&mut self.refractive_index)?;
        if s.gate(FRESNEL_RULES) {
            s.value(&mut self.refraction)?;
            s.gated(FUZZ_RULES, |s| s.value(&mut self.fuzz))?;
        }
        for texture in self.textures.iter_mut() {
            s.resource(texture, ResourceType::Texture, false)?;
        }
        s.bytes(&mut self.wrap_s)?;
        s.bytes(&mut self.wrap_t)?;
        s.gated(SOUND_RULES, |s| s.i32(&mut self.sound_enum))
    }
}

impl Resource for GfxMaterialHeader {
    const RESOURCE_TYPE: ResourceType = ResourceType::GfxMaterial;
}
