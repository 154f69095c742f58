use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskConfigError {
    #[error("risk config validation failed: {0}")]
    ValidationError(String),
}

/// Caps applied by the risk manager, in the order listed in the validation
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub initial_capital: Decimal,
    /// Max open positions per strategy.
    pub per_strategy_position_cap: usize,
    /// Max open positions across all strategies.
    pub global_position_cap: usize,
    /// Max `price × quantity` for a single entry.
    pub per_trade_notional_cap: Decimal,
    /// Entries stop once daily realized P&L reaches `-daily_loss_cap`.
    pub daily_loss_cap: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            per_strategy_position_cap: 3,
            global_position_cap: 5,
            per_trade_notional_cap: dec!(50000),
            daily_loss_cap: dec!(5000),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(RiskConfigError::ValidationError(
                "initial_capital must be positive".to_string(),
            ));
        }
        if self.per_strategy_position_cap == 0 {
            return Err(RiskConfigError::ValidationError(
                "per_strategy_position_cap must be at least 1".to_string(),
            ));
        }
        if self.global_position_cap < self.per_strategy_position_cap {
            return Err(RiskConfigError::ValidationError(format!(
                "global_position_cap ({}) must not be below per_strategy_position_cap ({})",
                self.global_position_cap, self.per_strategy_position_cap
            )));
        }
        if self.per_trade_notional_cap <= Decimal::ZERO {
            return Err(RiskConfigError::ValidationError(
                "per_trade_notional_cap must be positive".to_string(),
            ));
        }
        if self.daily_loss_cap < Decimal::ZERO {
            return Err(RiskConfigError::ValidationError(
                "daily_loss_cap must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
