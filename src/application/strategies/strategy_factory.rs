use crate::application::strategies::rsi_momentum::{RsiMomentumParams, RsiMomentumStrategy};
use crate::application::strategies::scalping_mtf_atr::{
    ScalpingMtfAtrParams, ScalpingMtfAtrStrategy,
};
use crate::application::strategies::supertrend::{SupertrendParams, SupertrendStrategy};
use crate::application::strategies::traits::Strategy;
use crate::config::StrategyConfig;
use crate::domain::errors::ConfigError;
use tracing::info;

/// In-process registry from `class_name` strings to constructors. No runtime
/// code loading; an unknown class is a startup configuration error.
pub struct StrategyFactory;

impl StrategyFactory {
    pub fn create(config: &StrategyConfig) -> Result<Box<dyn Strategy>, ConfigError> {
        let strategy: Box<dyn Strategy> = match config.class_name.as_str() {
            "rsi_momentum" => {
                let params: RsiMomentumParams = parse_params(config)?;
                Box::new(RsiMomentumStrategy::new(&config.id, params))
            }
            "supertrend" => {
                let params: SupertrendParams = parse_params(config)?;
                Box::new(SupertrendStrategy::new(&config.id, params))
            }
            "scalping_mtf_atr" => {
                let params: ScalpingMtfAtrParams = parse_params(config)?;
                Box::new(ScalpingMtfAtrStrategy::new(&config.id, params))
            }
            other => return Err(ConfigError::UnknownStrategyClass(other.to_string())),
        };
        info!(
            "StrategyFactory: built '{}' ({}) for timeframes {:?}",
            config.id,
            config.class_name,
            strategy.required_timeframes()
        );
        Ok(strategy)
    }

    pub fn known_classes() -> &'static [&'static str] {
        &["rsi_momentum", "supertrend", "scalping_mtf_atr"]
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(config: &StrategyConfig) -> Result<T, ConfigError> {
    config
        .params
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::InvalidParameters {
            strategy: config.id.clone(),
            message: e.to_string(),
        })
}
