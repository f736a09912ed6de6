//! Per-call identity registry.
//!
//! Shared sub-objects live in a flat arena owned by the resource being
//! (de)serialized; fields hold arena indices. The registry maps those indices
//! to structural slot ids, assigned in first-encounter order, so that an
//! object reached twice is written once and read back as one shared instance.

use std::collections::{BTreeSet, HashMap};

use cw_types::ResourceDescriptor;

/// Outcome of visiting a reference slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// The reference is empty.
    Null,
    /// Already registered in this pass: only the slot id was transferred.
    Seen(usize),
    /// First encounter: the caller must transfer the full payload for this
    /// arena index. When decoding, the index equals the arena length the
    /// caller passed in and the caller must allocate it.
    First(usize),
}

/// Identity registry and dependency set for one top-level call.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    by_slot: HashMap<u32, usize>,
    by_index: HashMap<usize, u32>,
    next_slot: u32,
    dependencies: BTreeSet<ResourceDescriptor>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self {
            next_slot: 1,
            ..Self::default()
        }
    }

    /// Forget every registration. Called at the start of each top-level call.
    pub fn clear(&mut self) {
        self.by_slot.clear();
        self.by_index.clear();
        self.next_slot = 1;
        self.dependencies.clear();
    }

    /// Slot id previously assigned to an arena index.
    pub fn slot_of(&self, index: usize) -> Option<u32> {
        self.by_index.get(&index).copied()
    }

    /// The id the next newly encountered object will receive.
    pub fn peek_next_slot(&self) -> u32 {
        self.next_slot.max(1)
    }

    /// Assign the next slot id to an arena index (encode side).
    pub fn assign(&mut self, index: usize) -> u32 {
        if let Some(slot) = self.slot_of(index) {
            return slot;
        }
        let slot = self.peek_next_slot();
        self.next_slot = slot + 1;
        self.by_index.insert(index, slot);
        self.by_slot.insert(slot, index);
        slot
    }

    /// Register arena indices `0..len` in index order, in either direction.
    ///
    /// Afterwards every reference into the arena visits as [`Visit::Seen`]
    /// and transfers as a bare slot id.
    pub fn register_arena(&mut self, len: usize) {
        for index in 0..len {
            self.assign(index);
        }
    }

    /// Arena index registered under a slot id (decode side).
    pub fn resolve(&self, slot: u32) -> Option<usize> {
        self.by_slot.get(&slot).copied()
    }

    /// Register a freshly decoded object under its slot id.
    pub fn register(&mut self, slot: u32, index: usize) {
        self.by_slot.insert(slot, index);
        self.by_index.insert(index, slot);
        self.next_slot = self.next_slot.max(slot.saturating_add(1));
    }

    /// Number of distinct objects visited in this pass.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn add_dependency(&mut self, descriptor: ResourceDescriptor) {
        self.dependencies.insert(descriptor);
    }

    /// Every non-empty resource reference seen in this pass, in sorted order.
    pub fn dependencies(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.dependencies.iter()
    }

    pub fn into_dependencies(self) -> Vec<ResourceDescriptor> {
        self.dependencies.into_iter().collect()
    }
}
