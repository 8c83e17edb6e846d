//! The world: one archetype store, one transaction queue, and the systems that
//! turn queued transactions into store writes, tick by tick.
//!
//! A world starts [`WorldState::Open`]. Components, transaction types, reads
//! and systems are registered while open; [`World::load_game_state`] closes
//! registration and allows ticking.

use std::sync::Arc;

use engine_component::{ArchetypeStore, Component, ComponentMeta};
use engine_tx::{AnyTransactionType, Payload, Signature, TxQueue, TxRegistry, TxTypeId};
use tracing::{debug, info, info_span};

use crate::error::WorldError;
use crate::read::{AnyRead, ReadRegistry};
use crate::registry::{NamedSystem, SystemKind};
use crate::scheduler::{CurrentSystem, SystemManager};

/// Lifecycle state of a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    /// Accepting registrations; cannot tick.
    Open,
    /// Registration closed; ticking allowed.
    Loaded,
}

/// A single-writer, tick-driven state engine.
#[derive(Debug)]
pub struct World {
    state: WorldState,
    tick: u64,
    store: ArchetypeStore,
    queue: Arc<TxQueue>,
    transactions: TxRegistry,
    reads: ReadRegistry,
    systems: SystemManager,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty, open world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: WorldState::Open,
            tick: 0,
            store: ArchetypeStore::new(),
            queue: Arc::new(TxQueue::new()),
            transactions: TxRegistry::new(),
            reads: ReadRegistry::new(),
            systems: SystemManager::new(),
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorldState {
        self.state
    }

    /// The tick the next call to [`World::tick`] will process.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Register component types with the store.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistrationClosed`] once loaded, or a wrapped
    /// [`StoreError::DuplicateRegistration`](engine_component::StoreError).
    pub fn register_components(&mut self, metas: Vec<ComponentMeta>) -> Result<(), WorldError> {
        self.ensure_open("register components")?;
        self.store.register_components(metas)?;
        Ok(())
    }

    /// Register a single component type.
    ///
    /// # Errors
    ///
    /// See [`World::register_components`].
    pub fn register_component<T: Component>(&mut self) -> Result<(), WorldError> {
        self.register_components(vec![T::meta()])
    }

    /// Register transaction types, assigning IDs in slice order.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistrationClosed`] once loaded, or a wrapped
    /// [`TxError::DuplicateRegistration`](engine_tx::TxError).
    pub fn register_transaction_types(
        &mut self,
        types: &[&dyn AnyTransactionType],
    ) -> Result<Vec<TxTypeId>, WorldError> {
        self.ensure_open("register transaction types")?;
        Ok(self.transactions.register(types)?)
    }

    /// Register read handlers by name.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistrationClosed`] once loaded, or
    /// [`WorldError::DuplicateRegistration`].
    pub fn register_reads(&mut self, reads: &[&dyn AnyRead]) -> Result<(), WorldError> {
        self.ensure_open("register reads")?;
        self.reads.register(reads)
    }

    /// Register a group of systems, all init or all regular. They run in the
    /// order given, after any registered earlier.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistrationClosed`] once loaded, or
    /// [`WorldError::DuplicateRegistration`] if any name is taken. Nothing is
    /// registered on error.
    pub fn add_systems(&mut self, is_init: bool, systems: Vec<NamedSystem>) -> Result<(), WorldError> {
        self.ensure_open("add systems")?;
        let kind = if is_init { SystemKind::Init } else { SystemKind::Regular };
        let names: Vec<String> = systems.iter().map(|s| s.name().to_string()).collect();
        self.systems.register(kind, systems)?;
        debug!(?kind, ?names, "registered systems");
        Ok(())
    }

    /// Register one regular system.
    ///
    /// # Errors
    ///
    /// See [`World::add_systems`].
    pub fn add_system(&mut self, system: NamedSystem) -> Result<(), WorldError> {
        self.add_systems(false, vec![system])
    }

    /// Register one init system.
    ///
    /// # Errors
    ///
    /// See [`World::add_systems`].
    pub fn add_init_system(&mut self, system: NamedSystem) -> Result<(), WorldError> {
        self.add_systems(true, vec![system])
    }

    /// Close registration. Must be called exactly once before ticking.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistrationClosed`] if already loaded.
    pub fn load_game_state(&mut self) -> Result<(), WorldError> {
        self.ensure_open("load the game state again")?;
        self.state = WorldState::Loaded;
        info!(
            transaction_types = self.transactions.len(),
            reads = self.reads.len(),
            init_systems = self.systems.registry().init_count(),
            systems = self.systems.registry().regular_count(),
            "game state loaded"
        );
        Ok(())
    }

    /// Run one tick: freeze the pending transactions, then run every system
    /// against them in order.
    ///
    /// The frozen batch is consumed whether or not the tick succeeds. The tick
    /// number advances only on success.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotLoaded`] before [`World::load_game_state`], or the
    /// [`WorldError::SystemFailure`] of the first failing system.
    pub fn tick(&mut self) -> Result<(), WorldError> {
        if self.state != WorldState::Loaded {
            return Err(WorldError::NotLoaded);
        }
        let span = info_span!("tick", tick = self.tick);
        let _enter = span.enter();

        let batch = self.queue.swap_and_get_processing();
        debug!(transactions = batch.len(), "tick start");
        self.systems
            .run_tick(self.tick, &mut self.store, &batch, &self.queue)?;
        self.tick += 1;
        Ok(())
    }

    /// Shared handle to the transaction queue, for submitters on other
    /// threads.
    #[must_use]
    pub fn queue(&self) -> Arc<TxQueue> {
        Arc::clone(&self.queue)
    }

    /// Submit a type-erased transaction. Never waits on a running tick.
    pub fn add_transaction(&self, type_id: TxTypeId, payload: Payload, signature: Signature) {
        self.queue.add_transaction(type_id, payload, signature);
    }

    /// Returns a reference to the archetype store.
    #[must_use]
    pub fn store(&self) -> &ArchetypeStore {
        &self.store
    }

    /// Direct store access for setup between ticks.
    pub fn store_mut(&mut self) -> &mut ArchetypeStore {
        &mut self.store
    }

    /// Returns the registry of transaction types.
    #[must_use]
    pub fn transaction_types(&self) -> &TxRegistry {
        &self.transactions
    }

    /// Returns the registry of read handlers.
    #[must_use]
    pub fn reads(&self) -> &ReadRegistry {
        &self.reads
    }

    /// Names of every registered system, init systems first.
    pub fn registered_systems(&self) -> impl Iterator<Item = &str> {
        self.systems.registry().names()
    }

    /// The system running right now, if any.
    #[must_use]
    pub fn current_system(&self) -> Option<String> {
        self.systems.current_system().get()
    }

    /// A handle that reports the running system from any thread, including
    /// while this world is inside [`World::tick`].
    #[must_use]
    pub fn current_system_handle(&self) -> CurrentSystem {
        self.systems.current_system()
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), WorldError> {
        match self.state {
            WorldState::Open => Ok(()),
            WorldState::Loaded => Err(WorldError::RegistrationClosed(action)),
        }
    }
}
