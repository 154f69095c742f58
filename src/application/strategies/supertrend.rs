use crate::application::indicators::{Indicator, IndicatorSet};
use crate::application::strategies::traits::Strategy;
use crate::domain::market::{Candle, Tick, Timeframe};
use crate::domain::trading::{Fill, IndicatorSnapshot, OrderSide, Signal, SignalIntent, SignalOrigin};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupertrendParams {
    pub atr_period: usize,
    pub atr_multiplier: Decimal,
    pub min_hold_minutes: i64,
    pub min_volume: f64,
    pub timeframe: Timeframe,
    pub trade_quantity: Decimal,
    /// Immediate exit distance below entry, checked on every tick.
    pub hard_stop_pct: Decimal,
}

impl Default for SupertrendParams {
    fn default() -> Self {
        Self {
            atr_period: 10,
            atr_multiplier: dec!(3),
            min_hold_minutes: 5,
            min_volume: 0.0,
            timeframe: Timeframe::ThreeMin,
            trade_quantity: Decimal::ONE,
            hard_stop_pct: dec!(0.02),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Bullish,
    Bearish,
}

/// Carried band state for one symbol, updated once per closed candle of the
/// declared timeframe.
#[derive(Debug, Clone)]
struct BandState {
    final_upper: Decimal,
    final_lower: Decimal,
    trend: Trend,
    prev_close: Decimal,
    value: Decimal,
}

#[derive(Debug, Clone)]
struct OpenTrade {
    entry_price: Decimal,
    entry_timestamp: i64,
    quantity: Decimal,
}

/// Trend-following on Supertrend band flips: buy the bearish→bullish
/// crossover, exit on the reverse flip once the minimum hold has elapsed
/// (deferring the exit until it has), with a tick-level hard stop underneath.
#[derive(Debug)]
pub struct SupertrendStrategy {
    id: String,
    params: SupertrendParams,
    warmed_up: bool,
    indicators: HashMap<String, IndicatorSet>,
    bands: HashMap<String, BandState>,
    open_trades: HashMap<String, OpenTrade>,
    /// Symbols whose flip exit is deferred on the minimum hold.
    pending_exits: HashMap<String, String>,
    last_price: HashMap<String, Decimal>,
}

impl SupertrendStrategy {
    pub fn new(id: impl Into<String>, params: SupertrendParams) -> Self {
        Self {
            id: id.into(),
            params,
            warmed_up: false,
            indicators: HashMap::new(),
            bands: HashMap::new(),
            open_trades: HashMap::new(),
            pending_exits: HashMap::new(),
            last_price: HashMap::new(),
        }
    }

    fn indicator_set(&mut self, symbol: &str) -> &mut IndicatorSet {
        let capacity = self.params.atr_period + 64;
        self.indicators
            .entry(symbol.to_string())
            .or_insert_with(|| IndicatorSet::new(symbol, capacity))
    }

    /// Applies the band-smoothing rule for one closed candle and returns
    /// (previous trend, new trend).
    fn update_bands(&mut self, candle: &Candle, atr: f64) -> Option<(Trend, Trend)> {
        let atr = Decimal::from_f64(atr)?;
        let basic_upper = candle.hl2() + self.params.atr_multiplier * atr;
        let basic_lower = candle.hl2() - self.params.atr_multiplier * atr;

        if let Some(state) = self.bands.get_mut(&candle.symbol) {
            // Upper band only falls (or resets once price escapes above it);
            // lower band only rises (or resets below).
            let final_upper =
                if basic_upper < state.final_upper || state.prev_close > state.final_upper {
                    basic_upper
                } else {
                    state.final_upper
                };
            let final_lower =
                if basic_lower > state.final_lower || state.prev_close < state.final_lower {
                    basic_lower
                } else {
                    state.final_lower
                };

            let prev_trend = state.trend;
            let trend = match prev_trend {
                Trend::Bullish if candle.close <= final_lower => Trend::Bearish,
                Trend::Bearish if candle.close >= final_upper => Trend::Bullish,
                unchanged => unchanged,
            };

            state.final_upper = final_upper;
            state.final_lower = final_lower;
            state.trend = trend;
            state.prev_close = candle.close;
            state.value = match trend {
                Trend::Bullish => final_lower,
                Trend::Bearish => final_upper,
            };
            return Some((prev_trend, trend));
        }

        let trend = if candle.close >= basic_lower { Trend::Bullish } else { Trend::Bearish };
        let value = match trend {
            Trend::Bullish => basic_lower,
            Trend::Bearish => basic_upper,
        };
        self.bands.insert(
            candle.symbol.clone(),
            BandState {
                final_upper: basic_upper,
                final_lower: basic_lower,
                trend,
                prev_close: candle.close,
                value,
            },
        );
        None
    }

    fn snapshot(&self, symbol: &str) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new();
        if let Some(state) = self.bands.get(symbol) {
            if let Some(value) = state.value.to_f64() {
                snapshot.insert("supertrend".to_string(), value);
            }
            snapshot.insert(
                "supertrend_bullish".to_string(),
                if state.trend == Trend::Bullish { 1.0 } else { 0.0 },
            );
        }
        snapshot
    }

    fn exit_signal(&self, symbol: &str, price: Decimal, timestamp: i64, reason: &str) -> Option<Signal> {
        let trade = self.open_trades.get(symbol)?;
        Some(
            Signal::exit(
                self.id.clone(),
                symbol,
                OrderSide::Sell,
                price,
                trade.quantity,
                timestamp,
                reason,
            )
            .with_indicators(self.snapshot(symbol)),
        )
    }

    fn min_hold_elapsed(&self, symbol: &str, now_ms: i64) -> bool {
        self.open_trades
            .get(symbol)
            .map(|t| (now_ms - t.entry_timestamp) / 60_000 >= self.params.min_hold_minutes)
            .unwrap_or(false)
    }
}

impl Strategy for SupertrendStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &'static str {
        "supertrend"
    }

    fn warmup_candles_required(&self) -> usize {
        // Band carry needs a settled ATR before flips are meaningful.
        self.params.atr_period * 3
    }

    fn required_timeframes(&self) -> Vec<Timeframe> {
        vec![self.params.timeframe]
    }

    fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    fn set_warmed_up(&mut self, warmed_up: bool) {
        self.warmed_up = warmed_up;
    }

    fn on_candle_closed(&mut self, candle: &Candle) -> Vec<Signal> {
        if candle.timeframe != self.params.timeframe {
            return Vec::new();
        }
        let symbol = candle.symbol.clone();
        self.indicator_set(&symbol).add_closed_candle(candle);
        self.last_price.insert(symbol.clone(), candle.close);

        let atr_key = Indicator::Atr { period: self.params.atr_period };
        if !self.indicator_set(&symbol).is_ready(atr_key) {
            return Vec::new();
        }
        let Some(atr) = self.indicator_set(&symbol).get(atr_key).and_then(|v| v.scalar()) else {
            return Vec::new();
        };
        let Some((prev_trend, trend)) = self.update_bands(candle, atr) else {
            return Vec::new();
        };

        if !self.warmed_up {
            return Vec::new();
        }

        let mut signals = Vec::new();
        let close_timestamp = candle.end_timestamp();

        // A deferred flip exit fires as soon as the hold matures.
        if self.pending_exits.contains_key(&symbol)
            && self.min_hold_elapsed(&symbol, close_timestamp)
        {
            let reason = self.pending_exits.remove(&symbol).unwrap_or_default();
            signals.extend(self.exit_signal(&symbol, candle.close, close_timestamp, &reason));
            return signals;
        }

        match (prev_trend, trend) {
            (Trend::Bearish, Trend::Bullish) => {
                if !self.open_trades.contains_key(&symbol) && candle.volume > self.params.min_volume {
                    debug!(
                        "Supertrend[{}]: bullish flip on {} at {}",
                        self.id, symbol, candle.close
                    );
                    signals.push(
                        Signal::entry(
                            self.id.clone(),
                            symbol.clone(),
                            OrderSide::Buy,
                            candle.close,
                            self.params.trade_quantity,
                            close_timestamp,
                            "supertrend flipped bullish",
                        )
                        .with_indicators(self.snapshot(&symbol)),
                    );
                }
            }
            (Trend::Bullish, Trend::Bearish) => {
                if self.open_trades.contains_key(&symbol) {
                    if self.min_hold_elapsed(&symbol, close_timestamp) {
                        signals.extend(self.exit_signal(
                            &symbol,
                            candle.close,
                            close_timestamp,
                            "supertrend flipped bearish",
                        ));
                    } else {
                        debug!(
                            "Supertrend[{}]: bearish flip on {} deferred by min hold",
                            self.id, symbol
                        );
                        self.pending_exits
                            .insert(symbol.clone(), "supertrend flipped bearish".to_string());
                    }
                }
            }
            _ => {}
        }
        signals
    }

    fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
        self.last_price.insert(tick.symbol.clone(), tick.price);
        if !self.warmed_up {
            return Vec::new();
        }
        let Some(trade) = self.open_trades.get(&tick.symbol) else {
            return Vec::new();
        };

        // Hard stop overrides the hold and clears any deferred flip exit.
        if tick.price <= trade.entry_price * (Decimal::ONE - self.params.hard_stop_pct) {
            self.pending_exits.remove(&tick.symbol);
            return self
                .exit_signal(&tick.symbol, tick.price, tick.timestamp, "hard_stop")
                .into_iter()
                .collect();
        }

        if self.pending_exits.contains_key(&tick.symbol)
            && self.min_hold_elapsed(&tick.symbol, tick.timestamp)
        {
            let reason = self
                .pending_exits
                .remove(&tick.symbol)
                .unwrap_or_default();
            return self
                .exit_signal(&tick.symbol, tick.price, tick.timestamp, &reason)
                .into_iter()
                .collect();
        }
        Vec::new()
    }

    fn on_position_opened(&mut self, fill: &Fill) {
        if fill.intent != SignalIntent::Entry {
            return;
        }
        self.open_trades.insert(
            fill.symbol.clone(),
            OpenTrade {
                entry_price: fill.filled_price,
                entry_timestamp: fill.timestamp,
                quantity: fill.quantity,
            },
        );
    }

    fn on_position_closed(&mut self, fill: &Fill, _realized_pnl: Decimal) {
        self.open_trades.remove(&fill.symbol);
        self.pending_exits.remove(&fill.symbol);
    }

    fn square_off_all(&mut self, timestamp: i64) -> Vec<Signal> {
        let symbols: Vec<String> = self.open_trades.keys().cloned().collect();
        symbols
            .into_iter()
            .filter_map(|symbol| {
                let price = self
                    .last_price
                    .get(&symbol)
                    .copied()
                    .or_else(|| self.open_trades.get(&symbol).map(|t| t.entry_price))?;
                self.exit_signal(&symbol, price, timestamp, "square_off")
            })
            .map(|signal| signal.with_origin(SignalOrigin::TimeController))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: i64 = 1704067200000;
    const TF_MS: i64 = 3 * 60_000;

    fn candle(open: f64, high: f64, low: f64, close: f64, index: i64) -> Candle {
        Candle::closed(
            "X",
            Timeframe::ThreeMin,
            Decimal::from_f64(open).unwrap(),
            Decimal::from_f64(high).unwrap(),
            Decimal::from_f64(low).unwrap(),
            Decimal::from_f64(close).unwrap(),
            1000.0,
            BASE + index * TF_MS,
        )
    }

    fn flat(close: f64, index: i64) -> Candle {
        candle(close, close + 1.0, close - 1.0, close, index)
    }

    fn fill(price: f64, timestamp: i64) -> Fill {
        Fill {
            trade_id: "st_X_1".to_string(),
            strategy_id: "st".to_string(),
            symbol: "X".to_string(),
            side: OrderSide::Buy,
            intent: SignalIntent::Entry,
            requested_price: Decimal::from_f64(price).unwrap(),
            filled_price: Decimal::from_f64(price).unwrap(),
            quantity: Decimal::ONE,
            timestamp,
        }
    }

    /// Downtrend long enough to settle ATR and pin the trend bearish, then a
    /// sharp rally that flips it bullish.
    #[test]
    fn test_bullish_flip_emits_single_buy() {
        let mut strategy = SupertrendStrategy::new("st", SupertrendParams::default());

        let mut index = 0;
        for i in 0..15 {
            strategy.on_candle_closed(&flat(150.0 - 3.0 * i as f64, index));
            index += 1;
        }
        strategy.set_warmed_up(true);

        // Rally: +5 per candle. Bands sit roughly 6 wide (ATR ≈ 2-3,
        // multiplier 3), so a few candles are enough to cross final_upper.
        let mut buys = Vec::new();
        for i in 0..8 {
            let signals = strategy.on_candle_closed(&flat(108.0 + 5.0 * i as f64, index));
            index += 1;
            buys.extend(signals);
        }

        assert_eq!(buys.len(), 1, "exactly one entry per flip");
        assert_eq!(buys[0].side, OrderSide::Buy);
        assert_eq!(buys[0].intent, SignalIntent::Entry);
        assert!(buys[0].reason.contains("bullish"));
    }

    #[test]
    fn test_bearish_flip_defers_until_min_hold() {
        let mut strategy = SupertrendStrategy::new("st", SupertrendParams::default());

        let mut index = 0;
        for i in 0..15 {
            strategy.on_candle_closed(&flat(100.0 + 2.0 * i as f64, index));
            index += 1;
        }
        strategy.set_warmed_up(true);

        // Enter manually right before the collapse; entry timestamp is the
        // current candle boundary.
        let entry_ts = BASE + index * TF_MS;
        strategy.on_position_opened(&fill(128.0, entry_ts));

        // Collapse hard enough to flip bearish on the first or second candle,
        // inside the 5-minute hold (one 3-minute candle later).
        let signals = strategy.on_candle_closed(&flat(100.0, index));
        index += 1;
        assert!(signals.is_empty(), "flip exit must be deferred by min hold");
        assert!(strategy.pending_exits.contains_key("X"));

        // Next candle close is 6 minutes after entry: the deferred exit fires.
        let signals = strategy.on_candle_closed(&flat(99.0, index));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::Sell);
        assert!(signals[0].reason.contains("bearish"));
    }

    #[test]
    fn test_hard_stop_overrides_hold_and_pending() {
        let mut strategy = SupertrendStrategy::new("st", SupertrendParams::default());
        for i in 0..15 {
            strategy.on_candle_closed(&flat(100.0 + 2.0 * i as f64, i));
        }
        strategy.set_warmed_up(true);
        let entry_ts = BASE + 15 * TF_MS;
        strategy.on_position_opened(&fill(128.0, entry_ts));

        // 2% below entry, one minute in.
        let tick = Tick::from_mid(
            "X",
            dec!(125.4),
            dec!(0.001),
            1.0,
            entry_ts + 60_000,
            "test",
        );
        let signals = strategy.on_tick(&tick);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "hard_stop");
    }

    #[test]
    fn test_ignores_other_timeframes() {
        let mut strategy = SupertrendStrategy::new("st", SupertrendParams::default());
        strategy.set_warmed_up(true);
        let mut candle = flat(100.0, 0);
        candle.timeframe = Timeframe::OneMin;
        assert!(strategy.on_candle_closed(&candle).is_empty());
        assert_eq!(strategy.indicators.len(), 0);
    }
}
