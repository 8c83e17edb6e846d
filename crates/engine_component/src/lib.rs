//! # engine_component
//!
//! The "C" in ECS: what a component is and how entities and their
//! components are stored.
//!
//! This crate provides:
//!
//! - [`Component`] trait, the contract all stored data must satisfy.
//! - [`Entity`], a lightweight `u64` identifier, and its storage [`Location`].
//! - [`EntityAllocator`], a monotonically increasing, non-recycling ID allocator.
//! - [`ArchetypeTable`], SoA storage grouped by component combination.
//! - [`ArchetypeStore`], the store that owns every table and keeps entity
//!   locations valid as rows move.

pub mod archetype;
pub mod component;
pub mod entity;
pub mod error;
pub mod store;

pub use archetype::{ArchetypeId, ArchetypeTable, Column, TypedColumn};
pub use component::{Component, ComponentMeta, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, Location};
pub use error::StoreError;
pub use store::ArchetypeStore;
