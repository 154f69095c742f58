use crate::domain::market::tick::Tick;
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A forming candle is mutable and still receiving ticks; it becomes closed
/// exactly once, after which it is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleState {
    Forming,
    Closed,
}

/// OHLCV bar for a fixed interval.
///
/// `timestamp` is the open timestamp, aligned to the timeframe boundary:
/// `⌊first tick time / tf⌋ × tf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: f64,
    pub tick_count: usize,
    pub timestamp: i64,
    pub state: CandleState,
}

impl Candle {
    /// Starts a new forming candle from the first tick of a period.
    pub fn open_from_tick(tick: &Tick, timeframe: Timeframe) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            timeframe,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.volume,
            tick_count: 1,
            timestamp: timeframe.period_start(tick.timestamp),
            state: CandleState::Forming,
        }
    }

    /// Builds an already-closed candle, e.g. from historical data.
    #[allow(clippy::too_many_arguments)]
    pub fn closed(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            open,
            high,
            low,
            close,
            volume,
            tick_count: 0,
            timestamp,
            state: CandleState::Closed,
        }
    }

    /// Folds a tick into this forming candle. Open stays, high/low widen,
    /// close follows the latest price, volume accumulates.
    pub fn apply_tick(&mut self, tick: &Tick) {
        debug_assert_eq!(self.state, CandleState::Forming);
        if tick.price > self.high {
            self.high = tick.price;
        }
        if tick.price < self.low {
            self.low = tick.price;
        }
        self.close = tick.price;
        self.volume += tick.volume;
        self.tick_count += 1;
    }

    /// Marks the candle closed. One-way transition.
    pub fn finalize(&mut self) {
        self.state = CandleState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == CandleState::Closed
    }

    /// End timestamp (exclusive) of this candle's period.
    pub fn end_timestamp(&self) -> i64 {
        self.timestamp + self.timeframe.duration_ms()
    }

    /// Whether `timestamp_ms` falls past this candle's period.
    pub fn is_past_boundary(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.end_timestamp()
    }

    /// `(high + low) / 2`, the Supertrend band midpoint.
    pub fn hl2(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }
}
