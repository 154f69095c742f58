use crate::application::risk_management::validators::{
    self, SignalValidator, ValidationContext, ValidationResult,
};
use crate::domain::risk::{RiskConfig, RiskConfigError, RiskState};
use crate::domain::trading::{Signal, SignalIntent};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Verdict for one signal. Rejected signals are recorded and discarded,
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskVerdict {
    pub approved: bool,
    pub reason: String,
}

impl RiskVerdict {
    fn approved() -> Self {
        Self { approved: true, reason: "approved".to_string() }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self { approved: false, reason: reason.into() }
    }
}

/// Approves or rejects every signal before it reaches the broker.
///
/// Entries run through an ordered fail-fast validator pipeline; exits are
/// approved whenever a matching open position exists, because they only ever
/// reduce risk.
pub struct RiskManager {
    state: RiskState,
    config: RiskConfig,
    entry_validators: Vec<Box<dyn SignalValidator>>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Result<Self, RiskConfigError> {
        config.validate()?;
        Ok(Self {
            state: RiskState::new(config.initial_capital),
            config,
            entry_validators: validators::entry_pipeline(),
        })
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Evaluates a signal. `has_open_position` answers "is there an open
    /// position for (signal.strategy_id, signal.symbol)".
    pub fn evaluate(&self, signal: &Signal, has_open_position: bool) -> RiskVerdict {
        match signal.intent {
            SignalIntent::Exit => {
                if has_open_position {
                    RiskVerdict::approved()
                } else {
                    debug!(
                        "RiskManager: exit for {}/{} has no matching position",
                        signal.strategy_id, signal.symbol
                    );
                    RiskVerdict::rejected("no_open_position")
                }
            }
            SignalIntent::Entry => {
                let ctx = ValidationContext {
                    state: &self.state,
                    config: &self.config,
                    has_open_position,
                };
                for validator in &self.entry_validators {
                    if let ValidationResult::Rejected(reason) = validator.validate(signal, &ctx) {
                        debug!(
                            "RiskManager: rejected {} {} on {} ({})",
                            signal.strategy_id, signal.side, signal.symbol, reason
                        );
                        return RiskVerdict::rejected(reason);
                    }
                }
                RiskVerdict::approved()
            }
        }
    }

    /// Blocks or unblocks new entries (driven by the time controller).
    pub fn set_trading_blocked(&mut self, blocked: bool) {
        if blocked && !self.state.trading_blocked {
            info!("RiskManager: trading blocked, only exits will be approved");
        }
        self.state.trading_blocked = blocked;
    }

    pub fn on_position_opened(&mut self, strategy_id: &str, entry_notional: Decimal) {
        self.state.on_position_opened(strategy_id, entry_notional);
    }

    pub fn on_position_reduced(&mut self, entry_notional_released: Decimal, realized_pnl: Decimal) {
        self.state.on_position_reduced(entry_notional_released, realized_pnl);
    }

    pub fn on_position_closed(&mut self, strategy_id: &str) {
        self.state.on_position_closed(strategy_id);
    }

    pub fn reset_daily(&mut self) {
        self.state.reset_daily();
    }
}
