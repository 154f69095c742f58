use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price observation inside a candle. Produced by the market
/// simulator, immutable once created.
///
/// Invariants: `bid <= price <= ask`, `volume >= 0`, and `price` stays within
/// the low/high of the candle the tick was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: f64,
    /// Milliseconds, market-local wall clock of the simulated day.
    pub timestamp: i64,
    /// Where this tick came from, e.g. "simulator".
    pub source: String,
}

impl Tick {
    /// Builds a tick around a mid price with a symmetric relative spread.
    pub fn from_mid(
        symbol: impl Into<String>,
        price: Decimal,
        spread: Decimal,
        volume: f64,
        timestamp: i64,
        source: impl Into<String>,
    ) -> Self {
        let half = spread / Decimal::TWO;
        Self {
            symbol: symbol.into(),
            price,
            bid: price * (Decimal::ONE - half),
            ask: price * (Decimal::ONE + half),
            volume,
            timestamp,
            source: source.into(),
        }
    }
}
