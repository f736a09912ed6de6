//! Thing parts.

use cw_serializer::{FieldRule, Serializer, SerializerResult};
use cw_types::{ResourceDescriptor, ResourceType};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::region::RegionOverride;
use crate::thing::{thing_ref, Part};

// ---------------------------------------------------------------
// PPos
// ---------------------------------------------------------------

const LOCAL_POSITION_RULES: &[FieldRule] = &[FieldRule::min(0x1a5)];
const ANIM_HASH_RULES: &[FieldRule] = &[FieldRule::min(0x31e)];

/// Placement of a thing in the world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PPos {
    pub world_position: Mat4,
    pub local_position: Mat4,
    pub anim_hash: u32,
}

impl Part for PPos {
    const FLAG: u32 = 1 << 0;

    fn transfer(&mut self, s: &mut Serializer<'_>, _: usize) -> SerializerResult<()> {
        s.m44(&mut self.world_position)?;
        s.gated(LOCAL_POSITION_RULES, |s| s.m44(&mut self.local_position))?;
        s.gated(ANIM_HASH_RULES, |s| s.u32(&mut self.anim_hash))
    }
}

// ---------------------------------------------------------------
// PBody
// ---------------------------------------------------------------

const FROZEN_RULES: &[FieldRule] = &[FieldRule::min(0x147)];
const EDITING_PLAYER_RULES: &[FieldRule] = &[FieldRule::min(0x22c)];

/// Rigid-body state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PBody {
    pub pos_vel: Vec3,
    pub ang_vel: f32,
    pub frozen: i32,
    pub editing_player: Option<crate::ThingRef>,
}

impl Part for PBody {
    const FLAG: u32 = 1 << 1;

    fn transfer(&mut self, s: &mut Serializer<'_>, arena_len: usize) -> SerializerResult<()> {
        s.v3(&mut self.pos_vel)?;
        s.f32(&mut self.ang_vel)?;
        s.gated(FROZEN_RULES, |s| s.i32(&mut self.frozen))?;
        if s.gate(EDITING_PLAYER_RULES) {
            thing_ref(s, arena_len, &mut self.editing_player)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------
// PRenderMesh
// ---------------------------------------------------------------

const CAST_SHADOWS_RULES: &[FieldRule] = &[FieldRule::min(0x2dc)];
const REGION_OVERRIDE_RULES: &[FieldRule] = &[
    FieldRule::min(0x2f0),
    FieldRule::min(0x4).sub_version().on_branch(cw_types::Branch::Leerdammer),
];

/// Visible geometry bound to a skeleton of things.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PRenderMesh {
    pub mesh: Option<ResourceDescriptor>,
    pub bone_things: Vec<Option<crate::ThingRef>>,
    pub rgba: u32,
    pub visibility_flags: u8,
    pub cast_shadows: bool,
    pub region_overrides: Vec<RegionOverride>,
}

impl Part for PRenderMesh {
    const FLAG: u32 = 1 << 2;

    fn transfer(&mut self, s: &mut Serializer<'_>, arena_len: usize) -> SerializerResult<()> {
        s.resource(&mut self.mesh, ResourceType::Mesh, false)?;

        // One slot id per bone, at least one byte each.
        let len = s.length(self.bone_things.len(), 1)?;
        self.bone_things.resize(len, None);
        for bone in self.bone_things.iter_mut() {
            thing_ref(s, arena_len, bone)?;
        }

        s.u32(&mut self.rgba)?;
        s.u8(&mut self.visibility_flags)?;
        s.gated(CAST_SHADOWS_RULES, |s| s.bool(&mut self.cast_shadows))?;
        s.gated(REGION_OVERRIDE_RULES, |s| s.array(&mut self.region_overrides))
    }
}

// ---------------------------------------------------------------
// PGroup
// ---------------------------------------------------------------

const EDITABLE_RULES: &[FieldRule] = &[FieldRule::min(0x18e)];

/// Membership data for a group of things built from one plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PGroup {
    pub plan: Option<ResourceDescriptor>,
    pub emitter: Option<crate::ThingRef>,
    pub lifetime: i32,
    pub copyable: bool,
    pub editable: bool,
}

impl Part for PGroup {
    const FLAG: u32 = 1 << 3;

    fn transfer(&mut self, s: &mut Serializer<'_>, arena_len: usize) -> SerializerResult<()> {
        s.resource(&mut self.plan, ResourceType::Plan, true)?;
        thing_ref(s, arena_len, &mut self.emitter)?;
        s.i32(&mut self.lifetime)?;
        s.bool(&mut self.copyable)?;
        s.gated(EDITABLE_RULES, |s| s.bool(&mut self.editable))
    }
}
