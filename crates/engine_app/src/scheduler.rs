//! System scheduler.
//!
//! Runs registered systems once per tick, strictly sequentially: on the first
//! tick every init system in registration order, then every regular system in
//! registration order. A failing system ends the tick on the spot. There is
//! no rollback; writes made by earlier systems in the tick stay in the store.

use std::sync::Arc;
use std::time::Instant;

use engine_component::ArchetypeStore;
use engine_tx::{TxBatch, TxQueue};
use parking_lot::RwLock;
use tracing::{debug, info_span, warn};

use crate::context::WorldContext;
use crate::error::WorldError;
use crate::registry::{NamedSystem, SystemKind, SystemRegistry};

/// Shared slot holding the name of the system currently running, readable
/// from any thread while a tick is in progress.
#[derive(Debug, Clone, Default)]
pub struct CurrentSystem(Arc<RwLock<Option<String>>>);

impl CurrentSystem {
    /// The running system's name, or `None` between systems and ticks.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.0.read().clone()
    }

    fn set(&self, name: Option<&str>) {
        *self.0.write() = name.map(str::to_owned);
    }
}

/// Clears the current-system slot when dropped, including on unwind.
struct RunningGuard<'a>(&'a CurrentSystem);

impl<'a> RunningGuard<'a> {
    fn enter(current: &'a CurrentSystem, name: &str) -> Self {
        current.set(Some(name));
        Self(current)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(None);
    }
}

/// Owns the system registry and sequences system execution.
#[derive(Debug, Default)]
pub struct SystemManager {
    registry: SystemRegistry,
    current: CurrentSystem,
    /// Number of init systems that have succeeded, in registration order.
    init_done: usize,
}

impl SystemManager {
    /// Create a manager with no systems.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// See [`SystemRegistry::register`].
    pub fn register(&mut self, kind: SystemKind, systems: Vec<NamedSystem>) -> Result<(), WorldError> {
        self.registry.register(kind, systems)
    }

    /// Returns a reference to the system registry.
    #[must_use]
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// Handle to the current-system slot.
    #[must_use]
    pub fn current_system(&self) -> CurrentSystem {
        self.current.clone()
    }

    /// Returns `true` once every init system has run successfully.
    #[must_use]
    pub fn init_complete(&self) -> bool {
        self.init_done >= self.registry.init_count()
    }

    /// Run one tick's worth of systems against `store` and `batch`.
    ///
    /// Each init system runs until it has succeeded once. After a failed
    /// tick the init phase resumes at the system that failed, so earlier init
    /// systems never run twice. A failed tick does not advance the tick
    /// number, so init systems only ever see tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SystemFailure`] for the first system that fails.
    /// Systems after it do not run.
    pub fn run_tick(
        &mut self,
        tick: u64,
        store: &mut ArchetypeStore,
        batch: &TxBatch,
        queue: &TxQueue,
    ) -> Result<(), WorldError> {
        let init = self.registry.init_mut();
        while let Some(sys) = init.get_mut(self.init_done) {
            run_system(&self.current, sys, tick, store, batch, queue)?;
            self.init_done += 1;
        }
        for sys in self.registry.regular_mut() {
            run_system(&self.current, sys, tick, store, batch, queue)?;
        }
        Ok(())
    }
}

fn run_system(
    current: &CurrentSystem,
    sys: &mut NamedSystem,
    tick: u64,
    store: &mut ArchetypeStore,
    batch: &TxBatch,
    queue: &TxQueue,
) -> Result<(), WorldError> {
    let span = info_span!("system", name = %sys.name, tick);
    let _enter = span.enter();

    let start = Instant::now();
    let result = {
        let _running = RunningGuard::enter(current, &sys.name);
        let mut ctx = WorldContext::new(tick, &sys.name, store, batch, queue);
        (sys.run)(&mut ctx)
    };

    let elapsed_us = start.elapsed().as_micros() as u64;
    match result {
        Ok(()) => {
            debug!(elapsed_us, "system finished");
            Ok(())
        }
        Err(source) => {
            warn!(elapsed_us, error = %source, "system failed, aborting tick");
            Err(WorldError::SystemFailure {
                system: sys.name.clone(),
                tick,
                source,
            })
        }
    }
}
