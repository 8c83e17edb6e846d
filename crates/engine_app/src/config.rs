//! Command-line and environment configuration.

use clap::Parser;

use crate::router::DEFAULT_SUBMITTER_TAG;
use crate::tick::TickConfig;

/// Runtime configuration for the engine binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "engine_app", about = "Tick-driven state engine")]
pub struct EngineConfig {
    /// Target ticks per second
    #[arg(short = 'r', long, env = "ENGINE_TICK_RATE", default_value_t = 10.0, value_parser = parse_tick_rate)]
    pub tick_rate: f64,

    /// Stop after this many ticks (0 = run until interrupted)
    #[arg(short = 'n', long, env = "ENGINE_MAX_TICKS", default_value_t = 0)]
    pub max_ticks: u64,

    /// Submitter tag stamped on routed messages
    #[arg(short, long, env = "ENGINE_SUBMITTER_TAG", default_value = DEFAULT_SUBMITTER_TAG)]
    pub submitter_tag: String,

    /// Number of player entities the demo spawns at tick 0
    #[arg(short, long, default_value_t = 100)]
    pub players: usize,
}

/// Accept only rates [`TickConfig::tick_budget`] can turn into a budget.
fn parse_tick_rate(raw: &str) -> Result<f64, String> {
    let tick_rate: f64 = raw.parse().map_err(|err| format!("{err}"))?;
    let config = TickConfig {
        tick_rate,
        max_ticks: 0,
    };
    config.tick_budget().map_err(|err| err.to_string())?;
    Ok(tick_rate)
}

impl EngineConfig {
    /// The tick loop settings carried by this configuration.
    #[must_use]
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate: self.tick_rate,
            max_ticks: self.max_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::try_parse_from(["engine_app"]).unwrap();
        assert_eq!(config.submitter_tag, "router");
        assert_eq!(config.players, 100);
    }

    #[test]
    fn test_flags_map_to_tick_config() {
        let config =
            EngineConfig::try_parse_from(["engine_app", "--tick-rate", "30", "--max-ticks", "12"]).unwrap();
        let tick = config.tick_config();
        assert!((tick.tick_rate - 30.0).abs() < f64::EPSILON);
        assert_eq!(tick.max_ticks, 12);
    }

    #[test]
    fn test_unusable_tick_rates_are_rejected() {
        for rate in ["0", "-1", "NaN", "inf", "fast"] {
            let result = EngineConfig::try_parse_from(["engine_app", "--tick-rate", rate]);
            assert!(result.is_err(), "tick rate {rate:?} was accepted");
        }
    }
}
