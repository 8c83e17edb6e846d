//! System registry.
//!
//! Holds init and regular systems in registration order. Names are unique
//! across both kinds; a registration call either adds every system it names
//! or none of them.

use std::collections::HashSet;

use crate::context::WorldContext;
use crate::error::WorldError;

/// A system body: a transition function run against a [`WorldContext`].
pub type SystemFn = Box<dyn FnMut(&mut WorldContext<'_>) -> anyhow::Result<()> + Send>;

/// Which phase a system runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    /// Runs once, at tick 0, before any regular system.
    Init,
    /// Runs every tick.
    Regular,
}

/// A system paired with its unique name.
pub struct NamedSystem {
    pub(crate) name: String,
    pub(crate) run: SystemFn,
}

impl NamedSystem {
    /// Pair a system body with its unique name.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&mut WorldContext<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(f),
        }
    }

    /// Returns the system name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for NamedSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NamedSystem").field(&self.name).finish()
    }
}

/// Shorthand for [`NamedSystem::new`].
pub fn system<F>(name: impl Into<String>, f: F) -> NamedSystem
where
    F: FnMut(&mut WorldContext<'_>) -> anyhow::Result<()> + Send + 'static,
{
    NamedSystem::new(name, f)
}

/// Ordered registry of every system in a world.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    init: Vec<NamedSystem>,
    regular: Vec<NamedSystem>,
    names: HashSet<String>,
}

impl SystemRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `systems` to the `kind` list, in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateRegistration`] naming the first system
    /// whose name is already registered (as either kind) or repeats within
    /// `systems`. Nothing is registered in that case.
    pub fn register(&mut self, kind: SystemKind, systems: Vec<NamedSystem>) -> Result<(), WorldError> {
        let mut batch = HashSet::with_capacity(systems.len());
        for sys in &systems {
            if self.names.contains(&sys.name) || !batch.insert(sys.name.as_str()) {
                return Err(WorldError::DuplicateRegistration(sys.name.clone()));
            }
        }

        self.names.extend(systems.iter().map(|sys| sys.name.clone()));
        match kind {
            SystemKind::Init => self.init.extend(systems),
            SystemKind::Regular => self.regular.extend(systems),
        }
        Ok(())
    }

    /// Names of every system: init systems first, then regular, each in
    /// registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.init.iter().chain(&self.regular).map(NamedSystem::name)
    }

    pub(crate) fn init_mut(&mut self) -> &mut [NamedSystem] {
        &mut self.init
    }

    pub(crate) fn regular_mut(&mut self) -> &mut [NamedSystem] {
        &mut self.regular
    }

    /// Returns the number of init systems.
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.init.len()
    }

    /// Returns the number of regular systems.
    #[must_use]
    pub fn regular_count(&self) -> usize {
        self.regular.len()
    }

    /// Returns `true` if a system of either kind carries `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
