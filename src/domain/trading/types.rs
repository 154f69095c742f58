use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// Order status transitions are terminal: pending → {filled, rejected}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Who produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOrigin {
    Strategy,
    TrailingSl,
    TimeController,
}

/// Whether a signal opens (or increases) exposure or closes (or reduces) it.
/// Long-only strategies map Buy→Entry / Sell→Exit; a short entry is a Sell
/// with `intent = Entry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalIntent {
    Entry,
    Exit,
}

/// Snapshot of the indicator values that backed a signal, keyed by indicator
/// label ("rsi_14", "sma_20", ...). BTreeMap keeps serialized output stable.
pub type IndicatorSnapshot = BTreeMap<String, f64>;

/// A strategy- or manager-emitted intent to trade. Consumed exactly once by
/// the risk manager; never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub strategy_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub intent: SignalIntent,
    /// Reference price at emission time.
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
    /// Human-readable description of the triggering conditions. Never empty.
    pub reason: String,
    pub origin: SignalOrigin,
    #[serde(default)]
    pub indicators: IndicatorSnapshot,
}

impl Signal {
    pub fn entry(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        timestamp: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side,
            intent: SignalIntent::Entry,
            price,
            quantity,
            timestamp,
            reason: reason.into(),
            origin: SignalOrigin::Strategy,
            indicators: IndicatorSnapshot::new(),
        }
    }

    pub fn exit(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        timestamp: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side,
            intent: SignalIntent::Exit,
            price,
            quantity,
            timestamp,
            reason: reason.into(),
            origin: SignalOrigin::Strategy,
            indicators: IndicatorSnapshot::new(),
        }
    }

    pub fn with_origin(mut self, origin: SignalOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_indicators(mut self, indicators: IndicatorSnapshot) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// What the order manager hands to a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub reference_price: Decimal,
    pub timestamp: i64,
}

/// Terminal broker answer: filled or rejected, synchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub filled_price: Option<Decimal>,
    pub reason: Option<String>,
}

/// Full order record kept by the order manager for the run audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub requested_price: Decimal,
    pub filled_price: Option<Decimal>,
    pub quantity: Decimal,
    pub status: OrderStatus,
    pub submitted_at: i64,
    pub filled_at: Option<i64>,
    /// Filled minus requested, signed from the trader's point of view.
    pub slippage: Decimal,
}

/// Confirmation that an order executed, routed to the position manager and
/// back to the originating strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub trade_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub intent: SignalIntent,
    pub requested_price: Decimal,
    pub filled_price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_display() {
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }

    #[test]
    fn test_signal_notional() {
        let signal = Signal::entry("s1", "TCS", OrderSide::Buy, dec!(100), dec!(5), 0, "test");
        assert_eq!(signal.notional(), dec!(500));
        assert_eq!(signal.intent, SignalIntent::Entry);
        assert_eq!(signal.origin, SignalOrigin::Strategy);
    }

    #[test]
    fn test_signal_serializes_with_field_names() {
        let mut indicators = IndicatorSnapshot::new();
        indicators.insert("rsi_14".to_string(), 28.5);
        let signal = Signal::entry("s1", "TCS", OrderSide::Buy, dec!(100), dec!(5), 42, "rsi entry")
            .with_indicators(indicators);

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["strategy_id"], "s1");
        assert_eq!(json["intent"], "entry");
        assert_eq!(json["origin"], "strategy");
        assert_eq!(json["indicators"]["rsi_14"], 28.5);
    }
}
