use crate::domain::market::Tick;
use crate::domain::trading::{Fill, Position, Signal, SignalIntent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// A finished trade, kept for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub trade_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Signed as held: positive for longs.
    pub quantity: Decimal,
    pub realized_pnl: Decimal,
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
}

/// Result of applying an exit fill to the book.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitOutcome {
    /// Realized P&L of the portion this fill closed.
    pub realized_pnl: Decimal,
    /// Entry notional freed by the closed portion.
    pub released_notional: Decimal,
    pub remaining: Decimal,
    pub fully_closed: bool,
    /// Running realized P&L for the whole trade, partials included.
    pub trade_realized_pnl: Decimal,
}

/// The authoritative open-position book, keyed by (strategy_id, symbol).
/// Key uniqueness IS the one-position-per-(strategy, symbol) invariant; no
/// component holds back-pointers into this map.
pub struct PositionManager {
    positions: HashMap<(String, String), Position>,
    closed_trades: Vec<ClosedTrade>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            closed_trades: Vec::new(),
        }
    }

    pub fn has_open(&self, strategy_id: &str, symbol: &str) -> bool {
        self.positions
            .contains_key(&(strategy_id.to_string(), symbol.to_string()))
    }

    pub fn get(&self, strategy_id: &str, symbol: &str) -> Option<&Position> {
        self.positions
            .get(&(strategy_id.to_string(), symbol.to_string()))
    }

    pub fn by_trade_id(&self, trade_id: &str) -> Option<&Position> {
        self.positions.values().find(|p| p.trade_id == trade_id)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn total_realized_pnl(&self) -> Decimal {
        self.closed_trades.iter().map(|t| t.realized_pnl).sum()
    }

    /// Opens a position from an entry fill.
    pub fn open(&mut self, fill: &Fill, entry_signal: Option<Signal>) -> &Position {
        debug_assert_eq!(fill.intent, SignalIntent::Entry);
        let key = (fill.strategy_id.clone(), fill.symbol.clone());
        if self.positions.contains_key(&key) {
            warn!(
                "PositionManager: replacing unexpected duplicate position for {}/{}",
                fill.strategy_id, fill.symbol
            );
        }

        let mut position = Position::open(
            fill.trade_id.clone(),
            fill.strategy_id.clone(),
            fill.symbol.clone(),
            fill.side,
            fill.filled_price,
            fill.quantity,
            fill.timestamp,
        );
        position.entry_signal = entry_signal;
        info!(
            "PositionManager: opened {} {} {} @ {} (qty {})",
            fill.trade_id, fill.side, fill.symbol, fill.filled_price, fill.quantity
        );

        self.positions.insert(key.clone(), position);
        self.positions
            .get(&key)
            .expect("position inserted immediately above")
    }

    /// Applies an exit fill: reduces or closes FIFO within the single
    /// position held for (strategy_id, symbol).
    pub fn apply_exit(&mut self, fill: &Fill) -> Option<ExitOutcome> {
        let key = (fill.strategy_id.clone(), fill.symbol.clone());
        let position = self.positions.get_mut(&key)?;

        let closed_quantity = fill.quantity.min(position.abs_quantity());
        let realized_pnl = position.reduce(closed_quantity, fill.filled_price);
        let released_notional = position.entry_price * closed_quantity;
        let remaining = position.abs_quantity();
        let fully_closed = position.is_flat();
        let trade_realized_pnl = position.realized_pnl;

        if fully_closed {
            let position = self
                .positions
                .remove(&key)
                .expect("position verified present by get_mut");
            let signed_quantity = if fill.side == crate::domain::trading::OrderSide::Sell {
                closed_quantity
            } else {
                -closed_quantity
            };
            info!(
                "PositionManager: closed {} {} @ {} (pnl {})",
                position.trade_id, position.symbol, fill.filled_price, position.realized_pnl
            );
            self.closed_trades.push(ClosedTrade {
                trade_id: position.trade_id.clone(),
                strategy_id: position.strategy_id.clone(),
                symbol: position.symbol.clone(),
                entry_price: position.entry_price,
                exit_price: fill.filled_price,
                quantity: signed_quantity,
                realized_pnl: position.realized_pnl,
                entry_timestamp: position.entry_timestamp,
                exit_timestamp: fill.timestamp,
            });
        }

        Some(ExitOutcome {
            realized_pnl,
            released_notional,
            remaining,
            fully_closed,
            trade_realized_pnl,
        })
    }

    /// Marks every open position in the tick's symbol to the tick price.
    pub fn update_tick(&mut self, tick: &Tick) {
        for position in self.positions.values_mut() {
            if position.symbol == tick.symbol {
                position.update_price(tick.price);
            }
        }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::OrderSide;
    use rust_decimal_macros::dec;

    fn entry_fill(trade_id: &str, strategy: &str, symbol: &str, price: Decimal, qty: Decimal) -> Fill {
        Fill {
            trade_id: trade_id.to_string(),
            strategy_id: strategy.to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            intent: SignalIntent::Entry,
            requested_price: price,
            filled_price: price,
            quantity: qty,
            timestamp: 0,
        }
    }

    fn exit_fill(trade_id: &str, strategy: &str, symbol: &str, price: Decimal, qty: Decimal) -> Fill {
        Fill {
            trade_id: trade_id.to_string(),
            strategy_id: strategy.to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            intent: SignalIntent::Exit,
            requested_price: price,
            filled_price: price,
            quantity: qty,
            timestamp: 60_000,
        }
    }

    #[test]
    fn test_open_then_full_close() {
        let mut book = PositionManager::new();
        book.open(&entry_fill("t1", "s1", "A", dec!(100), dec!(10)), None);
        assert!(book.has_open("s1", "A"));
        assert_eq!(book.open_count(), 1);

        let outcome = book.apply_exit(&exit_fill("t1", "s1", "A", dec!(103), dec!(10))).unwrap();
        assert_eq!(outcome.realized_pnl, dec!(30));
        assert_eq!(outcome.released_notional, dec!(1000));
        assert!(outcome.fully_closed);
        assert!(!book.has_open("s1", "A"));
        assert_eq!(book.closed_trades().len(), 1);
        assert_eq!(book.total_realized_pnl(), dec!(30));
    }

    #[test]
    fn test_partial_exit_keeps_position() {
        let mut book = PositionManager::new();
        book.open(&entry_fill("t1", "s1", "A", dec!(100), dec!(10)), None);

        let outcome = book.apply_exit(&exit_fill("t1", "s1", "A", dec!(105), dec!(4))).unwrap();
        assert_eq!(outcome.realized_pnl, dec!(20));
        assert_eq!(outcome.remaining, dec!(6));
        assert!(!outcome.fully_closed);
        assert!(book.has_open("s1", "A"));
        assert!(book.closed_trades().is_empty());
    }

    #[test]
    fn test_exit_without_position_is_none() {
        let mut book = PositionManager::new();
        assert!(book.apply_exit(&exit_fill("t1", "s1", "A", dec!(100), dec!(1))).is_none());
    }

    #[test]
    fn test_same_symbol_different_strategies_coexist() {
        let mut book = PositionManager::new();
        book.open(&entry_fill("t1", "s1", "A", dec!(100), dec!(5)), None);
        book.open(&entry_fill("t2", "s2", "A", dec!(100), dec!(7)), None);
        assert_eq!(book.open_count(), 2);
        assert_eq!(book.by_trade_id("t2").unwrap().quantity, dec!(7));
    }

    #[test]
    fn test_update_tick_marks_only_matching_symbol() {
        let mut book = PositionManager::new();
        book.open(&entry_fill("t1", "s1", "A", dec!(100), dec!(10)), None);
        book.open(&entry_fill("t2", "s1", "B", dec!(50), dec!(10)), None);

        let tick = Tick::from_mid("A", dec!(104), dec!(0.001), 1.0, 1_000, "test");
        book.update_tick(&tick);

        assert_eq!(book.get("s1", "A").unwrap().unrealized_pnl, dec!(40));
        assert_eq!(book.get("s1", "B").unwrap().unrealized_pnl, Decimal::ZERO);
    }
}
