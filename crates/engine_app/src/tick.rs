//! Fixed-rate tick loop.
//!
//! Drives [`World::tick`] at a target rate, either blocking the calling
//! thread ([`TickLoop::run`]) or on a tokio task until a shutdown future
//! resolves ([`TickLoop::run_async`]). A tick error stops the loop and is
//! returned to the caller; nothing is retried.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::WorldError;
use crate::world::World;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Time allotted to one tick.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidTickRate`] unless the rate is finite, positive,
    /// and yields a non-zero budget.
    pub fn tick_budget(&self) -> Result<Duration, WorldError> {
        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            return Err(WorldError::InvalidTickRate(self.tick_rate));
        }
        match Duration::try_from_secs_f64(1.0 / self.tick_rate) {
            Ok(budget) if !budget.is_zero() => Ok(budget),
            _ => Err(WorldError::InvalidTickRate(self.tick_rate)),
        }
    }

    fn limit_reached(&self, ticks: u64) -> bool {
        self.max_ticks > 0 && ticks >= self.max_ticks
    }
}

/// Owns a loaded world and ticks it on a schedule.
#[derive(Debug)]
pub struct TickLoop {
    config: TickConfig,
    world: World,
}

impl TickLoop {
    /// Create a tick loop around `world`. The rate is checked when the loop
    /// starts.
    #[must_use]
    pub fn new(world: World, config: TickConfig) -> Self {
        Self { config, world }
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Stop owning the world and hand it back.
    #[must_use]
    pub fn into_world(self) -> World {
        self.world
    }

    /// Run one tick and warn if it overran the budget.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidTickRate`], or whatever [`World::tick`] returns.
    pub fn step(&mut self) -> Result<Duration, WorldError> {
        let budget = self.config.tick_budget()?;
        let start = Instant::now();
        self.world.tick()?;
        let elapsed = start.elapsed();
        if elapsed > budget {
            warn!(
                tick = self.world.current_tick() - 1,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "tick exceeded time budget"
            );
        }
        Ok(elapsed)
    }

    /// Tick on the calling thread until `max_ticks` is reached, or forever.
    /// Returns the number of ticks run.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidTickRate`] before the first tick, otherwise the
    /// first tick error.
    pub fn run(&mut self) -> Result<u64, WorldError> {
        let budget = self.config.tick_budget()?;
        let mut ticks = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let elapsed = self.step()?;
            ticks += 1;
            if self.config.limit_reached(ticks) {
                info!(ticks, "tick loop complete");
                return Ok(ticks);
            }
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }
        }
    }

    /// Tick on a tokio interval until `shutdown` resolves or `max_ticks` is
    /// reached. Returns the number of ticks run.
    ///
    /// Systems run on the calling task; `shutdown` is only observed between
    /// ticks.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidTickRate`] before the first tick, otherwise the
    /// first tick error.
    pub async fn run_async<F>(&mut self, shutdown: F) -> Result<u64, WorldError>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.tick_budget()?);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut ticks = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting async tick loop"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(ticks, "shutdown requested, stopping tick loop");
                    return Ok(ticks);
                }
                _ = interval.tick() => {}
            }

            self.step()?;
            ticks += 1;
            if self.config.limit_reached(ticks) {
                info!(ticks, "tick loop complete");
                return Ok(ticks);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::registry::system;

    fn counting_world(counter: &Arc<AtomicU64>) -> World {
        let mut world = World::new();
        let counter = Arc::clone(counter);
        world
            .add_system(system("count", move |_ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        world.load_game_state().unwrap();
        world
    }

    fn fast(max_ticks: u64) -> TickConfig {
        TickConfig {
            tick_rate: 1000.0,
            max_ticks,
        }
    }

    #[test]
    fn test_run_limited_ticks() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut tick_loop = TickLoop::new(counting_world(&counter), fast(5));
        assert_eq!(tick_loop.run().unwrap(), 5);
        assert_eq!(tick_loop.world().current_tick(), 5);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_run_stops_on_error() {
        let mut world = World::new();
        world
            .add_system(system("broken", |ctx| {
                if ctx.tick() == 2 {
                    anyhow::bail!("tick two is cursed");
                }
                Ok(())
            }))
            .unwrap();
        world.load_game_state().unwrap();

        let mut tick_loop = TickLoop::new(world, fast(10));
        let err = tick_loop.run().unwrap_err();
        assert!(matches!(err, WorldError::SystemFailure { tick: 2, .. }));
        assert_eq!(tick_loop.world().current_tick(), 2);
    }

    #[test]
    fn test_unloaded_world_fails_first_step() {
        let mut tick_loop = TickLoop::new(World::new(), fast(1));
        assert!(matches!(tick_loop.step(), Err(WorldError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_run_async_honours_max_ticks() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut tick_loop = TickLoop::new(counting_world(&counter), fast(3));
        let ticks = tick_loop
            .run_async(std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(ticks, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_async_stops_on_shutdown() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut tick_loop = TickLoop::new(counting_world(&counter), fast(0));
        let ticks = tick_loop.run_async(async {}).await.unwrap();
        assert_eq!(ticks, 0);
        assert_eq!(tick_loop.world().current_tick(), 0);
    }

    #[test]
    fn test_tick_budget_rejects_unusable_rates() {
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY, 1e-300, 1e300] {
            let config = TickConfig {
                tick_rate: rate,
                max_ticks: 1,
            };
            assert!(
                matches!(config.tick_budget(), Err(WorldError::InvalidTickRate(_))),
                "rate {rate} was accepted"
            );
        }
        assert_eq!(fast(1).tick_budget().unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn test_zero_rate_fails_before_ticking() {
        let counter = Arc::new(AtomicU64::new(0));
        let config = TickConfig {
            tick_rate: 0.0,
            max_ticks: 3,
        };
        let mut tick_loop = TickLoop::new(counting_world(&counter), config);
        assert!(matches!(tick_loop.run(), Err(WorldError::InvalidTickRate(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(tick_loop.world().current_tick(), 0);
    }
}
