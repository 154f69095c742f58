use crate::domain::errors::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_seed() -> u64 {
    1
}

fn default_ticks_per_candle() -> usize {
    10
}

fn default_spread() -> f64 {
    0.001
}

fn default_slippage_min() -> f64 {
    0.0005
}

fn default_slippage_max() -> f64 {
    0.001
}

fn default_data_dir() -> String {
    "data".to_string()
}

/// Replay parameters for one simulated trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Trading day to replay.
    pub date: NaiveDate,
    pub symbols: Vec<String>,
    /// Single seed from which every random draw in the run is derived.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_ticks_per_candle")]
    pub ticks_per_candle: usize,
    /// Relative bid/ask spread, e.g. 0.001 for 10 bps.
    #[serde(default = "default_spread")]
    pub spread: f64,
    /// Playback speed multiplier. 0 means unthrottled (no inter-tick sleep).
    #[serde(default)]
    pub speed: u32,
    #[serde(default = "default_slippage_min")]
    pub slippage_min: f64,
    #[serde(default = "default_slippage_max")]
    pub slippage_max: f64,
    /// Directory the CSV data adapter reads from.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("simulation.symbols is empty".to_string()));
        }
        if self.ticks_per_candle < 4 {
            return Err(ConfigError::Invalid(
                "simulation.ticks_per_candle must be at least 4 (one per path waypoint)"
                    .to_string(),
            ));
        }
        if self.speed > 1000 {
            return Err(ConfigError::Invalid(
                "simulation.speed must be between 0 (unthrottled) and 1000".to_string(),
            ));
        }
        if !(0.0..0.1).contains(&self.spread) {
            return Err(ConfigError::Invalid(format!(
                "simulation.spread {} out of range [0, 0.1)",
                self.spread
            )));
        }
        if self.slippage_min < 0.0 || self.slippage_max < self.slippage_min {
            return Err(ConfigError::Invalid(
                "simulation.slippage range is inverted or negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SimulationConfig {
        SimulationConfig {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            symbols: vec!["TCS".to_string()],
            seed: 1,
            ticks_per_candle: 10,
            spread: 0.001,
            speed: 0,
            slippage_min: 0.0005,
            slippage_max: 0.001,
            data_dir: "data".to_string(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_symbols() {
        let mut config = base();
        config.symbols.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_too_few_ticks() {
        let mut config = base();
        config.ticks_per_candle = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let toml_src = r#"
            date = "2024-01-15"
            symbols = ["TCS", "INFY"]
        "#;
        let config: SimulationConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.seed, 1);
        assert_eq!(config.ticks_per_candle, 10);
        assert_eq!(config.spread, 0.001);
        assert_eq!(config.speed, 0);
    }
}
