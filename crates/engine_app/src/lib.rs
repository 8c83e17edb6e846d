//! # engine_app
//!
//! The world façade and system scheduler. A [`World`] composes an
//! [`ArchetypeStore`](engine_component::ArchetypeStore) with a double-buffered
//! [`TxQueue`](engine_tx::TxQueue) and runs registered systems against both
//! once per tick.
//!
//! ## Lifecycle
//!
//! 1. Register components, transaction types, reads, and systems.
//! 2. Call [`World::load_game_state`] to close registration.
//! 3. Call [`World::tick`] repeatedly, directly or through a [`TickLoop`].
//!
//! Transactions may be submitted from any thread at any time through
//! [`World::queue`] or a [`Router`]; each tick sees exactly those submitted
//! before it started.

pub mod config;
pub mod context;
pub mod error;
pub mod read;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod tick;
pub mod world;

pub use config::EngineConfig;
pub use context::WorldContext;
pub use error::WorldError;
pub use read::{AnyRead, ReadRegistry, ReadType};
pub use registry::{NamedSystem, SystemFn, SystemKind, SystemRegistry, system};
pub use router::{DEFAULT_SUBMITTER_TAG, Router};
pub use scheduler::{CurrentSystem, SystemManager};
pub use tick::{TickConfig, TickLoop};
pub use world::{World, WorldState};
