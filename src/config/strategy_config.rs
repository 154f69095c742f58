use serde::{Deserialize, Serialize};

/// One strategy instance as declared in the config file. `params` stays an
/// untyped table here; the strategy factory deserializes it into the typed
/// parameter struct for `class_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Unique instance id, e.g. "rsi_momentum_1". Becomes `strategy_id` on
    /// every signal the instance emits.
    pub id: String,
    /// Registry key: "rsi_momentum", "supertrend" or "scalping_mtf_atr".
    pub class_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "empty_params")]
    pub params: toml::Value,
}

fn default_enabled() -> bool {
    true
}

fn empty_params() -> toml::Value {
    toml::Value::Table(toml::value::Table::new())
}
