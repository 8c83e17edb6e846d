//! The archetype store.
//!
//! [`ArchetypeStore`] owns entity allocation, every archetype table, and the
//! entity-to-[`Location`] index. It has no internal locking: callers must
//! guarantee a single writer, which the scheduler does by handing the store to
//! exactly one system at a time.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::archetype::{ArchetypeId, ArchetypeTable};
use crate::component::{Component, ComponentMeta, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator, Location};
use crate::error::StoreError;

/// Column-oriented entity/component storage grouped by archetype.
#[derive(Debug, Default)]
pub struct ArchetypeStore {
    /// Entity ID allocator. IDs are never recycled.
    allocator: EntityAllocator,
    /// Registered component types.
    components: HashMap<ComponentTypeId, ComponentMeta>,
    /// All archetype tables, indexed by [`ArchetypeId`].
    archetypes: Vec<ArchetypeTable>,
    /// Maps component type sets to archetype IDs, for fast lookup.
    type_set_to_archetype: HashMap<BTreeSet<ComponentTypeId>, ArchetypeId>,
    /// Location of every live entity.
    locations: HashMap<Entity, Location>,
}

impl ArchetypeStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register component types with the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateRegistration`] if any name was already
    /// registered or appears twice in `metas`. Nothing is registered in that
    /// case.
    pub fn register_components(&mut self, metas: Vec<ComponentMeta>) -> Result<(), StoreError> {
        let mut seen = BTreeSet::new();
        for meta in &metas {
            if self.components.contains_key(&meta.type_id) || !seen.insert(meta.type_id) {
                return Err(StoreError::DuplicateRegistration(meta.name));
            }
        }
        for meta in metas {
            debug!(component = meta.name, "registered component");
            self.components.insert(meta.type_id, meta);
        }
        Ok(())
    }

    /// Register a single component type.
    ///
    /// # Errors
    ///
    /// See [`ArchetypeStore::register_components`].
    pub fn register<T: Component>(&mut self) -> Result<(), StoreError> {
        self.register_components(vec![T::meta()])
    }

    /// Returns `true` if the component type has been registered.
    #[must_use]
    pub fn is_registered(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    /// Create an entity holding default values for each of `types`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ComponentNotRegistered`] if any type is unknown.
    pub fn create(&mut self, types: &[ComponentTypeId]) -> Result<Entity, StoreError> {
        let archetype_id = self.archetype_for(types.iter().copied().collect())?;
        Ok(self.spawn_into(archetype_id))
    }

    /// Create `n` entities sharing the same component types.
    ///
    /// The archetype is resolved once for the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ComponentNotRegistered`] if any type is unknown.
    pub fn create_many(
        &mut self,
        n: usize,
        types: &[ComponentTypeId],
    ) -> Result<Vec<Entity>, StoreError> {
        let archetype_id = self.archetype_for(types.iter().copied().collect())?;
        let entities: Vec<Entity> = (0..n).map(|_| self.spawn_into(archetype_id)).collect();
        debug!(count = n, archetype = archetype_id.0, "created entities");
        Ok(entities)
    }

    /// Returns the current location of a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity was never issued
    /// or has been removed.
    pub fn location(&self, entity: Entity) -> Result<Location, StoreError> {
        self.locations
            .get(&entity)
            .copied()
            .ok_or(StoreError::EntityNotFound(entity))
    }

    /// Returns `true` if the entity is alive.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.locations.contains_key(&entity)
    }

    /// Returns `true` if `entity` was issued at some point, alive or not.
    #[must_use]
    pub fn was_issued(&self, entity: Entity) -> bool {
        self.allocator.was_issued(entity)
    }

    /// Read a component of `entity`.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        let loc = self.location(entity)?;
        self.archetypes[loc.archetype_id.index()]
            .get::<T>(loc.component_index)
            .ok_or(StoreError::ComponentNotOnEntity {
                entity,
                component: T::type_name(),
            })
    }

    /// Overwrite a component of `entity`.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), StoreError> {
        *self.slot_mut::<T>(entity)? = value;
        Ok(())
    }

    /// Replace a component of `entity` with `f(current)`, in place.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn update<T, F>(&mut self, entity: Entity, f: F) -> Result<(), StoreError>
    where
        T: Component,
        F: FnOnce(T) -> T,
    {
        let slot = self.slot_mut::<T>(entity)?;
        let current = std::mem::take(slot);
        *slot = f(current);
        Ok(())
    }

    /// Remove an entity and all of its components.
    ///
    /// The last row of the entity's archetype is moved into the freed slot and
    /// that entity's location is rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not alive.
    pub fn remove(&mut self, entity: Entity) -> Result<(), StoreError> {
        let loc = self
            .locations
            .remove(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;

        let table = &mut self.archetypes[loc.archetype_id.index()];
        if let Some(moved) = table.swap_remove(loc.component_index) {
            self.relocate(moved, Location::new(loc.archetype_id, loc.component_index));
        }
        debug!(%entity, "removed entity");
        Ok(())
    }

    /// Attach a new component to `entity`, moving it to the archetype for its
    /// enlarged type set.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`], [`StoreError::ComponentNotRegistered`],
    /// or [`StoreError::ComponentAlreadyOnEntity`].
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), StoreError> {
        let loc = self.location(entity)?;
        let type_id = T::component_type_id();
        let mut types = self.archetypes[loc.archetype_id.index()].component_types.clone();
        if !types.insert(type_id) {
            return Err(StoreError::ComponentAlreadyOnEntity {
                entity,
                component: T::type_name(),
            });
        }

        let dst = self.archetype_for(types)?;
        self.migrate(entity, loc, dst);
        self.set(entity, value)
    }

    /// Detach a component from `entity`, moving it to the archetype for its
    /// reduced type set. The removed value is returned.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, StoreError> {
        let value = self.get::<T>(entity)?.clone();
        let loc = self.location(entity)?;
        let mut types = self.archetypes[loc.archetype_id.index()].component_types.clone();
        types.remove(&T::component_type_id());

        let dst = self.archetype_for(types)?;
        self.migrate(entity, loc, dst);
        Ok(value)
    }

    /// Names of the components attached to `entity`, sorted by type ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not alive.
    pub fn component_names(&self, entity: Entity) -> Result<Vec<&'static str>, StoreError> {
        let loc = self.location(entity)?;
        Ok(self.archetypes[loc.archetype_id.index()]
            .component_types
            .iter()
            .filter_map(|ty| self.components.get(ty).map(|meta| meta.name))
            .collect())
    }

    /// Returns a reference to an archetype table by ID.
    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> Option<&ArchetypeTable> {
        self.archetypes.get(id.index())
    }

    /// Returns an iterator over all archetype tables.
    pub fn archetypes(&self) -> impl Iterator<Item = &ArchetypeTable> {
        self.archetypes.iter()
    }

    /// Returns the total number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    /// Returns the number of archetypes in the store.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Find all archetypes that contain ALL of the given required component types.
    #[must_use]
    pub fn matching_archetypes(&self, required: &[ComponentTypeId]) -> Vec<ArchetypeId> {
        self.archetypes
            .iter()
            .filter(|table| required.iter().all(|ty| table.has_component(*ty)))
            .map(|table| table.id)
            .collect()
    }

    /// Every live entity whose archetype contains all `required` types, in
    /// archetype-then-row order.
    #[must_use]
    pub fn entities_with(&self, required: &[ComponentTypeId]) -> Vec<Entity> {
        self.matching_archetypes(required)
            .into_iter()
            .flat_map(|id| self.archetypes[id.index()].entities().iter().copied())
            .collect()
    }

    /// Iterate `(entity, &T)` across every archetype that stores `T`.
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        let type_id = T::component_type_id();
        self.archetypes
            .iter()
            .filter(move |table| table.has_component(type_id))
            .flat_map(|table| table.iter::<T>())
    }

    fn slot_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        let loc = self.location(entity)?;
        self.archetypes[loc.archetype_id.index()]
            .get_mut::<T>(loc.component_index)
            .ok_or(StoreError::ComponentNotOnEntity {
                entity,
                component: T::type_name(),
            })
    }

    /// Get or create the archetype for exactly `types`.
    fn archetype_for(&mut self, types: BTreeSet<ComponentTypeId>) -> Result<ArchetypeId, StoreError> {
        if let Some(&id) = self.type_set_to_archetype.get(&types) {
            return Ok(id);
        }

        let metas = types
            .iter()
            .map(|ty| {
                self.components
                    .get(ty)
                    .ok_or_else(|| StoreError::ComponentNotRegistered(format!("{:#018x}", ty.0)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let id = ArchetypeId(self.archetypes.len() as u32);
        let table = ArchetypeTable::new(id, &metas);
        debug!(
            archetype = id.0,
            components = ?metas.iter().map(|meta| meta.name).collect::<Vec<_>>(),
            "created archetype"
        );
        self.archetypes.push(table);
        self.type_set_to_archetype.insert(types, id);
        Ok(id)
    }

    fn spawn_into(&mut self, archetype_id: ArchetypeId) -> Entity {
        let entity = self.allocator.allocate();
        let row = self.archetypes[archetype_id.index()].push_default(entity);
        self.locations.insert(entity, Location::new(archetype_id, row));
        trace!(%entity, archetype = archetype_id.0, row, "spawned entity");
        entity
    }

    /// Move `entity` from `loc` to the archetype `dst`, fixing up both its own
    /// location and that of whichever entity fills its old row.
    fn migrate(&mut self, entity: Entity, loc: Location, dst: ArchetypeId) {
        let src_idx = loc.archetype_id.index();
        let dst_idx = dst.index();
        if src_idx == dst_idx {
            return;
        }

        let (src, dst_table) = if src_idx < dst_idx {
            let (left, right) = self.archetypes.split_at_mut(dst_idx);
            (&mut left[src_idx], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(src_idx);
            (&mut right[0], &mut left[dst_idx])
        };

        let (new_row, moved) = src.move_row_to(loc.component_index, dst_table);
        self.relocate(entity, Location::new(dst, new_row));
        if let Some(moved) = moved {
            self.relocate(moved, loc);
        }
        trace!(%entity, from = loc.archetype_id.0, to = dst.0, "migrated entity");
    }

    fn relocate(&mut self, entity: Entity, loc: Location) {
        self.locations.insert(entity, loc);
    }
}
