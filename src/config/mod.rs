//! Layered configuration: a TOML document, `.env`/environment fallbacks and
//! CLI overrides applied by `main`. Validation failures are `ConfigError`
//! and exit the process with code 2.

pub mod simulation_config;
pub mod strategy_config;
pub mod time_config;
pub mod warmup_config;

pub use simulation_config::SimulationConfig;
pub use strategy_config::StrategyConfig;
pub use time_config::TimeConfig;
pub use warmup_config::WarmupConfig;

use crate::domain::errors::ConfigError;
use crate::domain::risk::RiskConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub warmup: WarmupConfig,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment beats file; CLI (applied by the caller) beats both.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("INTRASIM_DATA_DIR") {
            self.simulation.data_dir = dir;
        }
        if let Ok(seed) = std::env::var("INTRASIM_SEED")
            && let Ok(seed) = seed.parse()
        {
            self.simulation.seed = seed;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.time.validate()?;
        self.risk
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.strategies.iter().filter(|s| s.enabled).count() == 0 {
            return Err(ConfigError::Invalid(
                "no enabled strategies configured".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for strategy in &self.strategies {
            if !seen.insert(strategy.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate strategy id '{}'",
                    strategy.id
                )));
            }
        }
        Ok(())
    }
}
