use serde::{Deserialize, Serialize};

fn default_min_candles() -> usize {
    50
}

fn default_auto_calculate() -> bool {
    true
}

/// Warmup sizing. The effective candle count is the max over strategies'
/// declared requirements, floored at `min_candles` when `auto_calculate` is
/// set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    pub auto_calculate: bool,
    pub min_candles: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            auto_calculate: default_auto_calculate(),
            min_candles: default_min_candles(),
        }
    }
}
