//! Archetype definitions and column storage.
//!
//! An archetype is a unique combination of component types. Entities sharing
//! the same set of components are grouped into the same archetype table so
//! iteration over one component type walks a dense `Vec`.

use std::any::Any;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentMeta, ComponentTypeId};
use crate::entity::Entity;

/// Identifier of an archetype table. Archetypes are numbered densely in the
/// order the store first needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchetypeId(pub u32);

impl ArchetypeId {
    /// Position of the table in the store's archetype list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A type-erased column holding every instance of one component type within
/// an archetype table.
pub trait Column: Any + Send + Sync {
    /// The component type stored in this column.
    fn component_type(&self) -> ComponentTypeId;

    /// Number of rows currently stored.
    fn len(&self) -> usize;

    /// Returns `true` if the column holds no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the component's default value.
    fn push_default(&mut self);

    /// Remove `row`, moving the last row into its place.
    fn swap_remove(&mut self, row: usize);

    /// Swap-remove `row` from this column and append the value to `dst`.
    ///
    /// Returns `false` (and leaves both columns untouched) if `dst` stores a
    /// different component type or `row` is out of bounds.
    fn move_row(&mut self, row: usize, dst: &mut dyn Column) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl std::fmt::Debug for dyn Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("component_type", &self.component_type())
            .field("len", &self.len())
            .finish()
    }
}

/// Dense storage for a single component type.
#[derive(Debug, Clone)]
pub struct TypedColumn<T: Component> {
    data: Vec<T>,
}

impl<T: Component> TypedColumn<T> {
    /// Create an empty column.
    #[must_use]
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Borrow the column as a slice, in row order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the value at `row`, if in bounds.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<&T> {
        self.data.get(row)
    }

    /// Returns a mutable reference to the value at `row`, if in bounds.
    #[must_use]
    pub fn get_mut(&mut self, row: usize) -> Option<&mut T> {
        self.data.get_mut(row)
    }
}

impl<T: Component> Default for TypedColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Column for TypedColumn<T> {
    fn component_type(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn push_default(&mut self) {
        self.data.push(T::default());
    }

    fn swap_remove(&mut self, row: usize) {
        self.data.swap_remove(row);
    }

    fn move_row(&mut self, row: usize, dst: &mut dyn Column) -> bool {
        if row >= self.data.len() {
            return false;
        }
        let Some(dst) = dst.as_any_mut().downcast_mut::<TypedColumn<T>>() else {
            return false;
        };
        dst.data.push(self.data.swap_remove(row));
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A table of entities sharing the same archetype (set of component types).
///
/// Data is stored in struct-of-arrays layout: one [`Column`] per component
/// type, sorted by [`ComponentTypeId`], with entity IDs in a parallel vector.
/// `entities[i]` corresponds to row `i` in every column.
#[derive(Debug)]
pub struct ArchetypeTable {
    /// The archetype identifier.
    pub id: ArchetypeId,
    /// Sorted set of component type IDs that define this archetype.
    pub component_types: BTreeSet<ComponentTypeId>,
    /// Entity IDs in row order.
    entities: Vec<Entity>,
    /// One column per component type, in the same order as `component_types`.
    columns: Vec<Box<dyn Column>>,
}

impl ArchetypeTable {
    /// Create a new, empty archetype table with one column per meta.
    #[must_use]
    pub fn new(id: ArchetypeId, metas: &[&ComponentMeta]) -> Self {
        let mut metas = metas.to_vec();
        metas.sort_by_key(|meta| meta.type_id);
        metas.dedup_by_key(|meta| meta.type_id);

        Self {
            id,
            component_types: metas.iter().map(|meta| meta.type_id).collect(),
            entities: Vec::new(),
            columns: metas.iter().map(|meta| (meta.new_column)()).collect(),
        }
    }

    /// Returns the number of entities in this archetype table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if this table has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity IDs in row order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns `true` if this archetype contains the given component type.
    #[must_use]
    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.component_types.contains(&type_id)
    }

    /// Returns the column index for the given component type, if present.
    #[must_use]
    pub fn column_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.columns
            .binary_search_by_key(&type_id, |col| col.component_type())
            .ok()
    }

    /// Typed access to the column storing `T`.
    #[must_use]
    pub fn column<T: Component>(&self) -> Option<&TypedColumn<T>> {
        let idx = self.column_index(T::component_type_id())?;
        self.columns[idx].as_any().downcast_ref()
    }

    /// Typed mutable access to the column storing `T`.
    #[must_use]
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut TypedColumn<T>> {
        let idx = self.column_index(T::component_type_id())?;
        self.columns[idx].as_any_mut().downcast_mut()
    }

    /// Returns the `T` value at `row`, or `None` if the table lacks `T` or
    /// the row is out of bounds.
    #[must_use]
    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.column::<T>()?.get(row)
    }

    /// Mutable form of [`ArchetypeTable::get`].
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(row)
    }

    /// Append a row of default-valued components for `entity` and return the
    /// new row index.
    pub fn push_default(&mut self, entity: Entity) -> usize {
        for col in &mut self.columns {
            col.push_default();
        }
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Remove `row` from every column, compacting by moving the last row
    /// into the hole.
    ///
    /// Returns the entity that now occupies `row`, if one was moved.
    pub fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        if row >= self.entities.len() {
            return None;
        }
        for col in &mut self.columns {
            col.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Move the entity at `row` into `dst`.
    ///
    /// Columns shared by both tables carry their values across; columns only
    /// in `self` are dropped and columns only in `dst` receive defaults.
    /// Returns the entity's row in `dst` and the entity (if any) that was
    /// swapped into `row` here.
    pub fn move_row_to(&mut self, row: usize, dst: &mut ArchetypeTable) -> (usize, Option<Entity>) {
        let entity = self.entities[row];

        for col in &mut self.columns {
            let moved = match dst.column_index(col.component_type()) {
                Some(idx) => col.move_row(row, &mut *dst.columns[idx]),
                None => false,
            };
            if !moved {
                col.swap_remove(row);
            }
        }
        let target_len = dst.entities.len() + 1;
        for col in &mut dst.columns {
            if col.len() < target_len {
                col.push_default();
            }
        }

        self.entities.swap_remove(row);
        dst.entities.push(entity);
        (dst.entities.len() - 1, self.entities.get(row).copied())
    }

    /// Iterate `(entity, &T)` over every row of this table.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        let values = self.column::<T>().map(TypedColumn::as_slice).unwrap_or(&[]);
        self.entities.iter().copied().zip(values.iter())
    }
}
