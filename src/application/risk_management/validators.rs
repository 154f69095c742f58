use crate::domain::risk::{RiskConfig, RiskState};
use crate::domain::trading::Signal;

/// Outcome of one validator. The first rejection in the pipeline wins and
/// its reason string is reported verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Approved,
    Rejected(String),
}

pub struct ValidationContext<'a> {
    pub state: &'a RiskState,
    pub config: &'a RiskConfig,
    /// Whether an open position already exists for (strategy_id, symbol).
    pub has_open_position: bool,
}

pub trait SignalValidator: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult;
}

/// 1. Entries stop once the time controller blocks trading.
pub struct TradingBlockedValidator;

impl SignalValidator for TradingBlockedValidator {
    fn name(&self) -> &'static str {
        "trading_blocked"
    }

    fn validate(&self, _signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.state.trading_blocked {
            ValidationResult::Rejected("trading_blocked".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// 2. Per-strategy open position cap.
pub struct PerStrategyCapValidator;

impl SignalValidator for PerStrategyCapValidator {
    fn name(&self) -> &'static str {
        "per_strategy_cap"
    }

    fn validate(&self, signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.state.open_count_for(&signal.strategy_id) >= ctx.config.per_strategy_position_cap {
            ValidationResult::Rejected("per_strategy_cap".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// 3. Global open position cap.
pub struct GlobalCapValidator;

impl SignalValidator for GlobalCapValidator {
    fn name(&self) -> &'static str {
        "global_cap"
    }

    fn validate(&self, _signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.state.open_positions_total >= ctx.config.global_position_cap {
            ValidationResult::Rejected("global_cap".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// 4. Single-trade notional cap.
pub struct NotionalCapValidator;

impl SignalValidator for NotionalCapValidator {
    fn name(&self) -> &'static str {
        "notional_cap"
    }

    fn validate(&self, signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if signal.notional() > ctx.config.per_trade_notional_cap {
            ValidationResult::Rejected("notional_cap".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// 5. Available capital must cover the entry notional.
pub struct CapitalValidator;

impl SignalValidator for CapitalValidator {
    fn name(&self) -> &'static str {
        "insufficient_capital"
    }

    fn validate(&self, signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if signal.notional() > ctx.state.capital {
            ValidationResult::Rejected("insufficient_capital".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// 6. Daily realized loss floor.
pub struct DailyLossValidator;

impl SignalValidator for DailyLossValidator {
    fn name(&self) -> &'static str {
        "daily_loss_cap"
    }

    fn validate(&self, _signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.state.daily_realized_pnl <= -ctx.config.daily_loss_cap {
            ValidationResult::Rejected("daily_loss_cap".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// 7. One open position per (strategy, symbol).
pub struct DuplicatePositionValidator;

impl SignalValidator for DuplicatePositionValidator {
    fn name(&self) -> &'static str {
        "duplicate_position"
    }

    fn validate(&self, _signal: &Signal, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.has_open_position {
            ValidationResult::Rejected("duplicate_position".to_string())
        } else {
            ValidationResult::Approved
        }
    }
}

/// The entry pipeline in its mandated order.
pub fn entry_pipeline() -> Vec<Box<dyn SignalValidator>> {
    vec![
        Box::new(TradingBlockedValidator),
        Box::new(PerStrategyCapValidator),
        Box::new(GlobalCapValidator),
        Box::new(NotionalCapValidator),
        Box::new(CapitalValidator),
        Box::new(DailyLossValidator),
        Box::new(DuplicatePositionValidator),
    ]
}
