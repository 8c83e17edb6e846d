//! Entity identifiers, storage locations, and allocation.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data. The
//! store pairs every live entity with a [`Location`], which is the only way
//! to reach its component data.

use serde::{Deserialize, Serialize};

use crate::archetype::ArchetypeId;

/// A unique entity identifier.
///
/// Entities are pure identifiers. Components are attached to entities to give
/// them meaning. An ID is never reissued, even after the entity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u64);

impl Entity {
    /// The null / invalid entity sentinel.
    pub const INVALID: Entity = Entity(0);

    /// Create an entity from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Where an entity's components live: the archetype table and the row inside
/// every column of that table.
///
/// The store rewrites a location whenever it moves the entity, so a location
/// read from the store always addresses a valid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// The archetype table holding the entity.
    pub archetype_id: ArchetypeId,
    /// Row index shared by all columns of the archetype.
    pub component_index: usize,
}

impl Location {
    /// Create a location from an archetype and a row.
    #[must_use]
    pub const fn new(archetype_id: ArchetypeId, component_index: usize) -> Self {
        Self {
            archetype_id,
            component_index,
        }
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// There is deliberately no free-list: removed IDs stay retired for the
/// lifetime of the allocator.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is reserved for [`Entity::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&mut self) -> Entity {
        let id = self.next_id;
        self.next_id += 1;
        Entity(id)
    }

    /// Returns `true` if `entity` was handed out by this allocator at some point.
    #[must_use]
    pub fn was_issued(&self, entity: Entity) -> bool {
        entity.is_valid() && entity.0 < self.next_id
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let e = Entity::from_raw(42);
        assert_eq!(e.id(), 42);
        assert!(e.is_valid());
    }

    #[test]
    fn test_entity_invalid() {
        assert!(!Entity::INVALID.is_valid());
        assert_eq!(Entity::INVALID.id(), 0);
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.id(), 1);
        assert_eq!(e2.id(), 2);
        assert_eq!(e3.id(), 3);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_allocator_tracks_issued_ids() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.was_issued(e));
        assert!(!alloc.was_issued(Entity::from_raw(2)));
        assert!(!alloc.was_issued(Entity::INVALID));
    }

    #[test]
    fn test_location_serialization_roundtrip() {
        let loc = Location::new(ArchetypeId(3), 17);
        let bytes = rmp_serde::to_vec(&loc).unwrap();
        let restored: Location = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(loc, restored);
    }
}
