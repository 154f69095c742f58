use crate::domain::trading::types::{OrderSide, Signal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open exposure held by one strategy in one symbol.
///
/// Quantity is signed: positive for longs, negative for shorts. The highest
/// price seen is monotonically non-decreasing for the life of the position,
/// the lowest monotonically non-increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub entry_timestamp: i64,
    pub current_price: Decimal,
    pub highest_price: Decimal,
    pub lowest_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub entry_signal: Option<Signal>,
}

impl Position {
    pub fn open(
        trade_id: impl Into<String>,
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        entry_price: Decimal,
        quantity: Decimal,
        entry_timestamp: i64,
    ) -> Self {
        let signed_quantity = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        Self {
            trade_id: trade_id.into(),
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            entry_price,
            quantity: signed_quantity,
            entry_timestamp,
            current_price: entry_price,
            highest_price: entry_price,
            lowest_price: entry_price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            entry_signal: None,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity >= Decimal::ZERO
    }

    /// Unsigned remaining quantity.
    pub fn abs_quantity(&self) -> Decimal {
        self.quantity.abs()
    }

    /// Updates the mark price, extremes and unrealized P&L.
    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = price;
        if price > self.highest_price {
            self.highest_price = price;
        }
        if price < self.lowest_price {
            self.lowest_price = price;
        }
        self.unrealized_pnl = (price - self.entry_price) * self.quantity;
    }

    /// Unrealized P&L as a fraction of entry notional, signed from the
    /// position holder's point of view.
    pub fn unrealized_pnl_pct(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let direction = if self.is_long() { Decimal::ONE } else { -Decimal::ONE };
        (self.current_price - self.entry_price) / self.entry_price * direction
    }

    /// Reduces the position by `close_quantity` (unsigned) at `exit_price`.
    /// Returns the realized P&L for the closed portion:
    /// `(exit − entry) × signed closed quantity`.
    pub fn reduce(&mut self, close_quantity: Decimal, exit_price: Decimal) -> Decimal {
        let close_quantity = close_quantity.min(self.abs_quantity());
        let signed_closed = if self.is_long() { close_quantity } else { -close_quantity };
        let realized = (exit_price - self.entry_price) * signed_closed;

        self.quantity -= signed_closed;
        self.realized_pnl += realized;
        realized
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Minutes this position has been open as of `now_ms`.
    pub fn age_minutes(&self, now_ms: i64) -> i64 {
        (now_ms - self.entry_timestamp) / 60_000
    }
}
