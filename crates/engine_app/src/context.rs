//! Per-invocation context handed to system functions.

use engine_component::{ArchetypeStore, Component, ComponentTypeId, Entity, StoreError};
use engine_tx::{Signature, TransactionType, TxBatch, TxError, TxPayload, TxQueue, TypedView};

/// What a system sees while it runs: the tick's frozen transaction batch,
/// exclusive access to the store, and a handle for submitting follow-up
/// transactions.
///
/// Transactions submitted through [`WorldContext::submit`] land in the active
/// buffer and are processed on the next tick, never the current one.
pub struct WorldContext<'a> {
    tick: u64,
    system: &'a str,
    store: &'a mut ArchetypeStore,
    batch: &'a TxBatch,
    queue: &'a TxQueue,
}

impl<'a> WorldContext<'a> {
    pub(crate) fn new(
        tick: u64,
        system: &'a str,
        store: &'a mut ArchetypeStore,
        batch: &'a TxBatch,
        queue: &'a TxQueue,
    ) -> Self {
        Self {
            tick,
            system,
            store,
            batch,
            queue,
        }
    }

    /// The tick being processed. The first tick is 0.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Name of the running system.
    #[must_use]
    pub fn system_name(&self) -> &str {
        self.system
    }

    /// This tick's frozen batch.
    #[must_use]
    pub fn batch(&self) -> &'a TxBatch {
        self.batch
    }

    /// Transactions of type `tx` in this tick's batch, in submission order.
    #[must_use]
    pub fn transactions<T: TxPayload>(&self, tx: &TransactionType<T>) -> TypedView<'a, T> {
        self.batch.view(tx)
    }

    /// Returns a reference to the store.
    #[must_use]
    pub fn store(&self) -> &ArchetypeStore {
        self.store
    }

    /// Returns a mutable reference to the store.
    pub fn store_mut(&mut self) -> &mut ArchetypeStore {
        self.store
    }

    /// See [`ArchetypeStore::create`].
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentNotRegistered`].
    pub fn create(&mut self, types: &[ComponentTypeId]) -> Result<Entity, StoreError> {
        self.store.create(types)
    }

    /// See [`ArchetypeStore::create_many`].
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentNotRegistered`].
    pub fn create_many(&mut self, n: usize, types: &[ComponentTypeId]) -> Result<Vec<Entity>, StoreError> {
        self.store.create_many(n, types)
    }

    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        self.store.get(entity)
    }

    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), StoreError> {
        self.store.set(entity, value)
    }

    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotOnEntity`].
    pub fn update<T, F>(&mut self, entity: Entity, f: F) -> Result<(), StoreError>
    where
        T: Component,
        F: FnOnce(T) -> T,
    {
        self.store.update(entity, f)
    }

    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`].
    pub fn remove(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.store.remove(entity)
    }

    /// Queue a transaction for the next tick.
    ///
    /// # Errors
    ///
    /// [`TxError::NotRegistered`] if `tx` has no ID.
    pub fn submit<T: TxPayload>(&self, tx: &TransactionType<T>, value: T, signature: Signature) -> Result<(), TxError> {
        tx.add_to_queue(self.queue, value, signature)
    }
}

impl std::fmt::Debug for WorldContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldContext")
            .field("tick", &self.tick)
            .field("system", &self.system)
            .field("batch_len", &self.batch.len())
            .finish_non_exhaustive()
    }
}
