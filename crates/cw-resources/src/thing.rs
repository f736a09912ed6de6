use cw_serializer::{FieldRule, Serializer, SerializerError, SerializerResult, Visit};
use cw_types::Guid;
use serde::{Deserialize, Serialize};

use crate::parts::{PBody, PGroup, PPos, PRenderMesh};

/// Index of a [`Thing`] in its owning graph's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingRef(pub usize);

impl ThingRef {
    pub const fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------

const CREATOR_RULES: &[FieldRule] = &[FieldRule::min(0x21b)];
const PLAN_GUID_RULES: &[FieldRule] = &[FieldRule::min(0x254)];

/// A component attached to a [`Thing`].
///
/// Parts are written in a fixed order after a presence mask; `FLAG` is the
/// part's bit in that mask. `arena_len` bounds the thing references a part
/// may hold.
pub trait Part: Default {
    const FLAG: u32;

    fn transfer(&mut self, s: &mut Serializer<'_>, arena_len: usize) -> SerializerResult<()>;
}

/// A node in a scene's object graph.
///
/// References to other things are arena indices; `parent` is a non-owning
/// back-reference and children are derived from it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub uid: u32,
    pub parent: Option<ThingRef>,
    pub group_head: Option<ThingRef>,
    pub created_by: Option<ThingRef>,
    pub changed_by: Option<ThingRef>,
    pub plan_guid: Option<Guid>,
    pub pos: Option<PPos>,
    pub body: Option<PBody>,
    pub render_mesh: Option<PRenderMesh>,
    pub group: Option<PGroup>,
}

impl Thing {
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }

    /// Presence mask of the attached parts.
    pub fn part_mask(&self) -> u32 {
        let mut mask = 0;
        if self.pos.is_some() {
            mask |= PPos::FLAG;
        }
        if self.body.is_some() {
            mask |= PBody::FLAG;
        }
        if self.render_mesh.is_some() {
            mask |= PRenderMesh::FLAG;
        }
        if self.group.is_some() {
            mask |= PGroup::FLAG;
        }
        mask
    }

    /// Transfer this thing's own fields. Other things are referenced by
    /// slot id only and must already be registered.
    pub(crate) fn transfer(
        &mut self,
        s: &mut Serializer<'_>,
        arena_len: usize,
    ) -> SerializerResult<()> {
        s.u32(&mut self.uid)?;
        thing_ref(s, arena_len, &mut self.parent)?;
        thing_ref(s, arena_len, &mut self.group_head)?;
        if s.gate(CREATOR_RULES) {
            thing_ref(s, arena_len, &mut self.created_by)?;
            thing_ref(s, arena_len, &mut self.changed_by)?;
        }
        s.gated(PLAN_GUID_RULES, |s| s.guid(&mut self.plan_guid))?;

        let known = PPos::FLAG | PBody::FLAG | PRenderMesh::FLAG | PGroup::FLAG;
        let start = s.position();
        let mut mask = self.part_mask();
        s.u32(&mut mask)?;
        if mask & !known != 0 {
            return Err(SerializerError::format(
                start,
                format!("unknown part bits {:#x}", mask & !known),
            ));
        }
        part(s, arena_len, mask, &mut self.pos)?;
        part(s, arena_len, mask, &mut self.body)?;
        part(s, arena_len, mask, &mut self.render_mesh)?;
        part(s, arena_len, mask, &mut self.group)
    }
}

fn part<P: Part>(
    s: &mut Serializer<'_>,
    arena_len: usize,
    mask: u32,
    slot: &mut Option<P>,
) -> SerializerResult<()> {
    if mask & P::FLAG == 0 {
        *slot = None;
        return Ok(());
    }
    slot.get_or_insert_with(P::default).transfer(s, arena_len)
}

/// Transfer a reference to a thing in an arena of `arena_len` things.
///
/// The arena must have been registered with the serializer's graph, so a
/// reference is always a bare slot id. A slot that names no registered
/// thing is a format error.
pub fn thing_ref(
    s: &mut Serializer<'_>,
    arena_len: usize,
    value: &mut Option<ThingRef>,
) -> SerializerResult<()> {
    let start = s.position();
    let target = if s.is_reading() {
        None
    } else {
        value.map(ThingRef::index)
    };
    match s.reference(target, arena_len)? {
        Visit::Null => *value = None,
        Visit::Seen(index) if index < arena_len => *value = Some(ThingRef(index)),
        Visit::Seen(_) | Visit::First(_) => {
            return Err(SerializerError::format(
                start,
                "reference to a thing outside the graph",
            ));
        }
    }
    Ok(())
}
