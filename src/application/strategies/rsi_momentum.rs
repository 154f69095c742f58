use crate::application::indicators::{Indicator, IndicatorSet};
use crate::application::risk_management::trailing_stops::{TrailingPolicy, TrailingSpec};
use crate::application::strategies::traits::Strategy;
use crate::domain::market::{Candle, Tick, Timeframe};
use crate::domain::trading::{Fill, IndicatorSnapshot, OrderSide, Signal, SignalIntent};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Mean-reversion entries on oversold RSI above the trend SMA; exits by hard
/// stop, profit target or overbought RSI, with trailing handed to the
/// trailing-stop manager when `use_external_trailing_sl` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiMomentumParams {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub ma_period: usize,
    /// Take-profit threshold as a fraction of entry, e.g. 0.015.
    pub target_pct: Decimal,
    /// Hard stop distance below entry.
    pub initial_sl_pct: Decimal,
    pub min_hold_minutes: i64,
    /// Unrealized-profit fraction that arms the breakeven clamp.
    pub breakeven_trigger_pct: Decimal,
    pub min_volume: f64,
    pub trade_quantity: Decimal,
    pub use_external_trailing_sl: bool,
    /// Distance for the externally managed fixed-percentage trail.
    pub trailing_sl_pct: Decimal,
}

impl Default for RsiMomentumParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            ma_period: 20,
            target_pct: dec!(0.015),
            initial_sl_pct: dec!(0.012),
            min_hold_minutes: 5,
            breakeven_trigger_pct: dec!(0.008),
            min_volume: 0.0,
            trade_quantity: Decimal::ONE,
            use_external_trailing_sl: true,
            trailing_sl_pct: dec!(0.015),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenTrade {
    trade_id: String,
    entry_price: Decimal,
    entry_timestamp: i64,
    quantity: Decimal,
}

#[derive(Debug)]
pub struct RsiMomentumStrategy {
    id: String,
    params: RsiMomentumParams,
    warmed_up: bool,
    indicators: HashMap<String, IndicatorSet>,
    open_trades: HashMap<String, OpenTrade>,
    last_price: HashMap<String, Decimal>,
}

impl RsiMomentumStrategy {
    pub fn new(id: impl Into<String>, params: RsiMomentumParams) -> Self {
        Self {
            id: id.into(),
            params,
            warmed_up: false,
            indicators: HashMap::new(),
            open_trades: HashMap::new(),
            last_price: HashMap::new(),
        }
    }

    fn indicator_set(&mut self, symbol: &str) -> &mut IndicatorSet {
        let capacity = self.params.ma_period.max(self.params.rsi_period + 1) + 64;
        self.indicators
            .entry(symbol.to_string())
            .or_insert_with(|| IndicatorSet::new(symbol, capacity))
    }

    fn snapshot(&mut self, symbol: &str) -> IndicatorSnapshot {
        let rsi_period = self.params.rsi_period;
        let ma_period = self.params.ma_period;
        let set = self.indicator_set(symbol);
        let mut snapshot = IndicatorSnapshot::new();
        if let Some(rsi) = set.get(Indicator::Rsi { period: rsi_period }).and_then(|v| v.scalar()) {
            snapshot.insert(format!("rsi_{rsi_period}"), rsi);
        }
        if let Some(sma) = set.get(Indicator::Sma { period: ma_period }).and_then(|v| v.scalar()) {
            snapshot.insert(format!("sma_{ma_period}"), sma);
        }
        snapshot
    }

    fn exit_signal(&mut self, symbol: &str, price: Decimal, timestamp: i64, reason: &str) -> Option<Signal> {
        let trade = self.open_trades.get(symbol)?;
        let quantity = trade.quantity;
        let snapshot = self.snapshot(symbol);
        Some(
            Signal::exit(self.id.clone(), symbol, OrderSide::Sell, price, quantity, timestamp, reason)
                .with_indicators(snapshot),
        )
    }
}

impl Strategy for RsiMomentumStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &'static str {
        "rsi_momentum"
    }

    fn warmup_candles_required(&self) -> usize {
        // RSI needs period + 1 closes; keep a cushion past the slower SMA.
        self.params.ma_period.max(self.params.rsi_period + 1) + 10
    }

    fn required_timeframes(&self) -> Vec<Timeframe> {
        vec![Timeframe::OneMin]
    }

    fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    fn set_warmed_up(&mut self, warmed_up: bool) {
        self.warmed_up = warmed_up;
    }

    fn on_candle_closed(&mut self, candle: &Candle) -> Vec<Signal> {
        if candle.timeframe != Timeframe::OneMin {
            return Vec::new();
        }
        let symbol = candle.symbol.clone();
        self.indicator_set(&symbol).add_closed_candle(candle);
        self.last_price.insert(symbol.clone(), candle.close);

        if !self.warmed_up || self.open_trades.contains_key(&symbol) {
            return Vec::new();
        }

        let rsi_key = Indicator::Rsi { period: self.params.rsi_period };
        let sma_key = Indicator::Sma { period: self.params.ma_period };
        let set = self.indicator_set(&symbol);
        if !set.is_ready(rsi_key) || !set.is_ready(sma_key) {
            return Vec::new();
        }
        let Some(rsi) = set.get(rsi_key).and_then(|v| v.scalar()) else {
            return Vec::new();
        };
        let Some(sma) = set.get(sma_key).and_then(|v| v.scalar()) else {
            return Vec::new();
        };
        let close = candle.close.to_f64().unwrap_or_default();

        if rsi < self.params.rsi_oversold && close > sma && candle.volume > self.params.min_volume {
            debug!(
                "RsiMomentum[{}]: oversold entry on {} (rsi {:.2}, close {:.2} > sma {:.2})",
                self.id, symbol, rsi, close, sma
            );
            let reason = format!(
                "rsi {:.2} < {:.2} with close above sma_{}",
                rsi, self.params.rsi_oversold, self.params.ma_period
            );
            let snapshot = self.snapshot(&symbol);
            return vec![
                Signal::entry(
                    self.id.clone(),
                    symbol,
                    OrderSide::Buy,
                    candle.close,
                    self.params.trade_quantity,
                    candle.end_timestamp(),
                    reason,
                )
                .with_indicators(snapshot),
            ];
        }
        Vec::new()
    }

    fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
        self.last_price.insert(tick.symbol.clone(), tick.price);
        if !self.warmed_up {
            return Vec::new();
        }
        let Some(trade) = self.open_trades.get(&tick.symbol) else {
            return Vec::new();
        };
        let entry = trade.entry_price;
        let entry_timestamp = trade.entry_timestamp;

        // 1. Hard stop: immediate, ignores minimum hold.
        if tick.price <= entry * (Decimal::ONE - self.params.initial_sl_pct) {
            return self
                .exit_signal(&tick.symbol.clone(), tick.price, tick.timestamp, "hard_stop")
                .into_iter()
                .collect();
        }

        let held_minutes = (tick.timestamp - entry_timestamp) / 60_000;
        if held_minutes < self.params.min_hold_minutes {
            return Vec::new();
        }

        let pnl_pct = if entry.is_zero() {
            Decimal::ZERO
        } else {
            (tick.price - entry) / entry
        };

        // 2. Target.
        if pnl_pct >= self.params.target_pct {
            return self
                .exit_signal(&tick.symbol.clone(), tick.price, tick.timestamp, "target")
                .into_iter()
                .collect();
        }

        // 3. Overbought exit, only while profitable.
        if pnl_pct > Decimal::ZERO {
            let symbol = tick.symbol.clone();
            let rsi_key = Indicator::Rsi { period: self.params.rsi_period };
            if let Some(rsi) = self.indicator_set(&symbol).get(rsi_key).and_then(|v| v.scalar())
                && rsi > self.params.rsi_overbought
            {
                return self
                    .exit_signal(&symbol, tick.price, tick.timestamp, "rsi_overbought")
                    .into_iter()
                    .collect();
            }
        }

        // 4. Trailing exits belong to the trailing-stop manager when
        //    `use_external_trailing_sl` is set; nothing to do here.
        Vec::new()
    }

    fn on_position_opened(&mut self, fill: &Fill) {
        if fill.intent != SignalIntent::Entry {
            return;
        }
        self.open_trades.insert(
            fill.symbol.clone(),
            OpenTrade {
                trade_id: fill.trade_id.clone(),
                entry_price: fill.filled_price,
                entry_timestamp: fill.timestamp,
                quantity: fill.quantity,
            },
        );
    }

    fn on_position_closed(&mut self, fill: &Fill, realized_pnl: Decimal) {
        if let Some(trade) = self.open_trades.remove(&fill.symbol) {
            debug!(
                "RsiMomentum[{}]: closed {} ({}) pnl {}",
                self.id, trade.trade_id, fill.symbol, realized_pnl
            );
        }
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
            .map(|signal| signal.with_origin(crate::domain::trading::SignalOrigin::TimeController))
            .collect()
    }

    fn trailing_spec(&self, _symbol: &str) -> Option<TrailingSpec> {
        if !self.params.use_external_trailing_sl {
            return None;
        }
        Some(TrailingSpec {
            policy: TrailingPolicy::FixedPct { pct: self.params.trailing_sl_pct },
            breakeven_trigger_pct: Some(self.params.breakeven_trigger_pct),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    const BASE: i64 = 1704067200000;

    fn candle(close: f64, volume: f64, index: i64) -> Candle {
        Candle::closed(
            "Z",
            Timeframe::OneMin,
            Decimal::from_f64(close).unwrap(),
            Decimal::from_f64(close + 0.5).unwrap(),
            Decimal::from_f64(close - 0.5).unwrap(),
            Decimal::from_f64(close).unwrap(),
            volume,
            BASE + index * 60_000,
        )
    }

    fn tick(price: f64, timestamp: i64) -> Tick {
        Tick::from_mid(
            "Z",
            Decimal::from_f64(price).unwrap(),
            dec!(0.001),
            1.0,
            timestamp,
            "test",
        )
    }

    fn fill(price: f64, timestamp: i64) -> Fill {
        Fill {
            trade_id: "r1_Z_1".to_string(),
            strategy_id: "r1".to_string(),
            symbol: "Z".to_string(),
            side: OrderSide::Buy,
            intent: SignalIntent::Entry,
            requested_price: Decimal::from_f64(price).unwrap(),
            filled_price: Decimal::from_f64(price).unwrap(),
            quantity: Decimal::ONE,
            timestamp,
        }
    }

    /// Slow 0.5-per-candle decline from 108 to 93. Wilder RSI(14) settles
    /// near 0 (no gains in the window); a later pop clears a short SMA.
    fn warm_up(strategy: &mut RsiMomentumStrategy) {
        for i in 0..=30 {
            strategy.on_candle_closed(&candle(108.0 - 0.5 * i as f64, 1000.0, i));
        }
        strategy.set_warmed_up(true);
    }

    #[test]
    fn test_no_signals_before_warmup() {
        let mut strategy = RsiMomentumStrategy::new("r1", RsiMomentumParams::default());
        for i in 0..40 {
            let signals = strategy.on_candle_closed(&candle(100.0 - i as f64, 1000.0, i));
            assert!(signals.is_empty(), "signal emitted during warmup");
        }
    }

    #[test]
    fn test_entry_requires_full_conjunction() {
        // Short SMA so the +1.5 bounce candle closes above the mean while
        // RSI(14) is still deeply oversold (≈ 18.8 by hand).
        let params = RsiMomentumParams { ma_period: 5, ..Default::default() };
        let mut strategy = RsiMomentumStrategy::new("r1", params);
        warm_up(&mut strategy);

        let signals = strategy.on_candle_closed(&candle(94.5, 2000.0, 31));
        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.side, OrderSide::Buy);
        assert_eq!(signal.intent, SignalIntent::Entry);
        assert!(signal.indicators.contains_key("rsi_14"));
        assert!(!signal.reason.is_empty());
    }

    #[test]
    fn test_entry_blocked_by_volume_floor() {
        let params = RsiMomentumParams {
            ma_period: 5,
            min_volume: 5000.0,
            ..Default::default()
        };
        let mut strategy = RsiMomentumStrategy::new("r1", params);
        warm_up(&mut strategy);
        let signals = strategy.on_candle_closed(&candle(94.5, 2000.0, 31));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_hard_stop_fires_before_min_hold() {
        let mut strategy = RsiMomentumStrategy::new("r1", RsiMomentumParams::default());
        warm_up(&mut strategy);
        strategy.on_position_opened(&fill(1000.0, BASE));

        // Two minutes in: below entry × (1 − 0.012) = 988.
        let signals = strategy.on_tick(&tick(985.0, BASE + 2 * 60_000));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "hard_stop");
        assert_eq!(signals[0].side, OrderSide::Sell);
        assert_eq!(signals[0].intent, SignalIntent::Exit);
    }

    #[test]
    fn test_target_respects_min_hold() {
        let mut strategy = RsiMomentumStrategy::new("r1", RsiMomentumParams::default());
        warm_up(&mut strategy);
        strategy.on_position_opened(&fill(1000.0, BASE));

        // +2% at t = 2 min: target met but hold not elapsed.
        assert!(strategy.on_tick(&tick(1020.0, BASE + 2 * 60_000)).is_empty());

        // Same price at t = 6 min: target exit.
        let signals = strategy.on_tick(&tick(1020.0, BASE + 6 * 60_000));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "target");
    }

    #[test]
    fn test_square_off_exits_all_held_symbols() {
        let mut strategy = RsiMomentumStrategy::new("r1", RsiMomentumParams::default());
        warm_up(&mut strategy);
        strategy.on_position_opened(&fill(1000.0, BASE));
        strategy.on_tick(&tick(1004.0, BASE + 60_000));

        let signals = strategy.square_off_all(BASE + 10 * 60_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "square_off");
        assert_eq!(
            signals[0].origin,
            crate::domain::trading::SignalOrigin::TimeController
        );
        assert_eq!(signals[0].price, dec!(1004.0));
    }

    #[test]
    fn test_trailing_spec_declared_when_external() {
        let strategy = RsiMomentumStrategy::new("r1", RsiMomentumParams::default());
        let spec = strategy.trailing_spec("Z").unwrap();
        assert_eq!(spec.breakeven_trigger_pct, Some(dec!(0.008)));
        assert!(matches!(spec.policy, TrailingPolicy::FixedPct { .. }));

        let params = RsiMomentumParams { use_external_trailing_sl: false, ..Default::default() };
        let strategy = RsiMomentumStrategy::new("r2", params);
        assert!(strategy.trailing_spec("Z").is_none());
    }
}
