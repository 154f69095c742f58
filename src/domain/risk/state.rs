use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Process-wide mutable risk state. Written only from the pipeline thread;
/// initialized at simulation start and reset at the day boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    /// Cash available for new entries.
    pub capital: Decimal,
    pub initial_capital: Decimal,
    pub daily_realized_pnl: Decimal,
    pub open_positions_by_strategy: HashMap<String, usize>,
    pub open_positions_total: usize,
    pub trades_today: usize,
    /// Set by the time controller at the warning boundary; blocks new entries.
    pub trading_blocked: bool,
}

impl RiskState {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            capital: initial_capital,
            initial_capital,
            daily_realized_pnl: Decimal::ZERO,
            open_positions_by_strategy: HashMap::new(),
            open_positions_total: 0,
            trades_today: 0,
            trading_blocked: false,
        }
    }

    pub fn open_count_for(&self, strategy_id: &str) -> usize {
        self.open_positions_by_strategy
            .get(strategy_id)
            .copied()
            .unwrap_or(0)
    }

    /// Records an entry fill: reserves notional and bumps position counts.
    pub fn on_position_opened(&mut self, strategy_id: &str, notional: Decimal) {
        self.capital -= notional;
        *self
            .open_positions_by_strategy
            .entry(strategy_id.to_string())
            .or_insert(0) += 1;
        self.open_positions_total += 1;
        self.trades_today += 1;
    }

    /// Records a (partial) exit fill: releases the closed portion's entry
    /// notional plus its realized P&L.
    pub fn on_position_reduced(&mut self, entry_notional: Decimal, realized_pnl: Decimal) {
        self.capital += entry_notional + realized_pnl;
        self.daily_realized_pnl += realized_pnl;
    }

    /// Drops the open-position counts once a position is fully closed.
    pub fn on_position_closed(&mut self, strategy_id: &str) {
        if let Some(count) = self.open_positions_by_strategy.get_mut(strategy_id) {
            *count = count.saturating_sub(1);
        }
        self.open_positions_total = self.open_positions_total.saturating_sub(1);
    }

    /// Day-boundary reset. Capital carries over; counters clear.
    pub fn reset_daily(&mut self) {
        self.daily_realized_pnl = Decimal::ZERO;
        self.trades_today = 0;
        self.trading_blocked = false;
    }
}
