//! Arena-backed thing graphs and the level resource that carries one.

use cw_serializer::{Resource, Serializable, Serializer, SerializerResult};
use cw_types::ResourceType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::thing::{thing_ref, Thing, ThingRef};

/// Flat arena of things. Every cross-reference is a [`ThingRef`] index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingGraph {
    things: Vec<Thing>,
}

impl ThingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a thing, returning its reference.
    pub fn add(&mut self, thing: Thing) -> ThingRef {
        self.things.push(thing);
        ThingRef(self.things.len() - 1)
    }

    /// Append `thing` as a child of `parent`.
    pub fn add_child(&mut self, parent: ThingRef, mut thing: Thing) -> ThingRef {
        thing.parent = Some(parent);
        self.add(thing)
    }

    pub fn get(&self, thing: ThingRef) -> Option<&Thing> {
        self.things.get(thing.index())
    }

    pub fn get_mut(&mut self, thing: ThingRef) -> Option<&mut Thing> {
        self.things.get_mut(thing.index())
    }

    pub fn len(&self) -> usize {
        self.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ThingRef, &Thing)> {
        self.things
            .iter()
            .enumerate()
            .map(|(index, thing)| (ThingRef(index), thing))
    }

    /// Things whose parent back-reference points at `parent`, in arena order.
    pub fn children_of(&self, parent: ThingRef) -> Vec<ThingRef> {
        self.iter()
            .filter(|(_, thing)| thing.parent == Some(parent))
            .map(|(child, _)| child)
            .collect()
    }

    /// Things without a parent.
    pub fn roots(&self) -> Vec<ThingRef> {
        self.iter()
            .filter(|(_, thing)| thing.parent.is_none())
            .map(|(root, _)| root)
            .collect()
    }

    pub fn find_by_uid(&self, uid: u32) -> Option<ThingRef> {
        self.iter()
            .find(|(_, thing)| thing.uid == uid)
            .map(|(found, _)| found)
    }
}

/// Smallest encoding of one thing: uid, parent, group head and part mask.
const MIN_THING_SIZE: usize = 4;

impl Serializable for ThingGraph {
    const BASE_ALLOCATION_SIZE: usize = 0x400;

    /// Layout: thing count, then each thing's fields in arena order.
    ///
    /// The whole arena is registered before any thing is transferred, so
    /// thing `i` has slot id `i + 1` and every reference is a bare slot id.
    /// Decoding rebuilds the arena in the same order.
    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
        let count = s.length(self.things.len(), MIN_THING_SIZE)?;
        if s.is_reading() {
            self.things.clear();
            self.things.resize_with(count, Thing::default);
        }
        s.graph_mut().register_arena(count);
        for thing in self.things.iter_mut() {
            thing.transfer(s, count)?;
        }
        if s.is_reading() {
            debug!(things = count, "decoded thing graph");
        }
        Ok(())
    }
}

/// A level: a thing graph plus the world thing that roots it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub graph: ThingGraph,
    pub world: Option<ThingRef>,
}

impl Serializable for Level {
    const BASE_ALLOCATION_SIZE: usize = 0x1000;

    fn serialize(&mut self, s: &mut Serializer<'_>) -> SerializerResult<()> {
        s.value(&mut self.graph)?;
        thing_ref(s, self.graph.len(), &mut self.world)
    }
}

impl Resource for Level {
    const RESOURCE_TYPE: ResourceType = ResourceType::Level;
}
