//! Archetype store error types.

use crate::entity::Entity;

/// Errors returned by [`ArchetypeStore`](crate::ArchetypeStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A component name was registered more than once.
    #[error("component {0:?} is already registered")]
    DuplicateRegistration(&'static str),

    /// A component type was used before being registered with the store.
    #[error("component {0} is not registered")]
    ComponentNotRegistered(String),

    /// The entity was never issued or has been removed.
    #[error("{0} not found")]
    EntityNotFound(Entity),

    /// The entity's archetype does not include the requested component type.
    #[error("component {component:?} is not on {entity}")]
    ComponentNotOnEntity {
        entity: Entity,
        component: &'static str,
    },

    /// The entity's archetype already includes the component being added.
    #[error("component {component:?} is already on {entity}")]
    ComponentAlreadyOnEntity {
        entity: Entity,
        component: &'static str,
    },
}
