use crate::application::indicators::{Indicator, IndicatorSet, IndicatorValue};
use crate::application::strategies::traits::Strategy;
use crate::domain::market::{Candle, Tick, Timeframe};
use crate::domain::trading::{Fill, IndicatorSnapshot, OrderSide, Signal, SignalIntent, SignalOrigin};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpingMtfAtrParams {
    /// Fast/slow EMAs on the primary timeframe.
    pub ema_fast: usize,
    pub ema_slow: usize,
    /// Mid-timeframe filter EMA.
    pub ema_mid: usize,
    /// Trend-timeframe filter EMA.
    pub ema_trend: usize,
    pub primary_timeframe: Timeframe,
    pub mid_timeframe: Timeframe,
    pub trend_timeframe: Timeframe,
    pub atr_period: usize,
    pub atr_sl_mult: f64,
    pub atr_tp1_mult: f64,
    pub atr_tp2_mult: f64,
    pub atr_trail_mult: f64,
    pub rsi_period: usize,
    pub rsi_long_min: f64,
    pub rsi_long_max: f64,
    pub rsi_short_min: f64,
    pub rsi_short_max: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_ma_period: usize,
    pub volume_multiplier: f64,
    /// Fraction of equity risked per trade.
    pub risk_per_trade: Decimal,
    pub max_positions: usize,
    /// Daily loss fraction of equity that disables further entries.
    pub daily_loss_limit: Decimal,
    pub max_consecutive_losses: usize,
    /// Profit in ATR units that moves the stop to breakeven.
    pub breakeven_atr: f64,
    /// Profit in ATR units that activates trailing.
    pub trailing_start_atr: f64,
    pub tp1_fraction: Decimal,
    pub tp2_fraction: Decimal,
    /// Pullback ceiling: |price − fast EMA| must stay under this × ATR.
    pub pullback_atr_limit: f64,
    pub initial_capital: Decimal,
}

impl Default for ScalpingMtfAtrParams {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_slow: 21,
            ema_mid: 50,
            ema_trend: 200,
            primary_timeframe: Timeframe::FiveMin,
            mid_timeframe: Timeframe::FifteenMin,
            trend_timeframe: Timeframe::OneHour,
            atr_period: 14,
            atr_sl_mult: 2.5,
            atr_tp1_mult: 2.0,
            atr_tp2_mult: 3.0,
            atr_trail_mult: 2.0,
            rsi_period: 14,
            rsi_long_min: 50.0,
            rsi_long_max: 70.0,
            rsi_short_min: 30.0,
            rsi_short_max: 50.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_ma_period: 20,
            volume_multiplier: 1.5,
            risk_per_trade: dec!(0.01),
            max_positions: 2,
            daily_loss_limit: dec!(0.025),
            max_consecutive_losses: 3,
            breakeven_atr: 1.0,
            trailing_start_atr: 1.5,
            tp1_fraction: dec!(0.5),
            tp2_fraction: dec!(0.3),
            pullback_atr_limit: 0.2,
            initial_capital: dec!(100000),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenScalp {
    side: OrderSide,
    entry_price: Decimal,
    initial_quantity: Decimal,
    remaining: Decimal,
    atr_at_entry: f64,
    stop: Decimal,
    tp1: Decimal,
    tp2: Decimal,
    tp1_done: bool,
    tp2_done: bool,
    trailing_active: bool,
    extreme: Decimal,
}

/// High-conviction scalps taken only when three timeframes align, with
/// ATR-based sizing, two partial profit targets and an ATR trail on the
/// remainder. Loss throttles shut off new entries for the day.
#[derive(Debug)]
pub struct ScalpingMtfAtrStrategy {
    id: String,
    params: ScalpingMtfAtrParams,
    warmed_up: bool,
    /// Per (symbol, timeframe) indicator history.
    indicators: HashMap<(String, Timeframe), IndicatorSet>,
    open_scalps: HashMap<String, OpenScalp>,
    current_atr: HashMap<String, f64>,
    last_price: HashMap<String, Decimal>,
    equity: Decimal,
    daily_pnl: Decimal,
    consecutive_losses: usize,
    entries_disabled: bool,
}

impl ScalpingMtfAtrStrategy {
    pub fn new(id: impl Into<String>, params: ScalpingMtfAtrParams) -> Self {
        let equity = params.initial_capital;
        Self {
            id: id.into(),
            params,
            warmed_up: false,
            indicators: HashMap::new(),
            open_scalps: HashMap::new(),
            current_atr: HashMap::new(),
            last_price: HashMap::new(),
            equity,
            daily_pnl: Decimal::ZERO,
            consecutive_losses: 0,
            entries_disabled: false,
        }
    }

    fn indicator_set(&mut self, symbol: &str, timeframe: Timeframe) -> &mut IndicatorSet {
        let capacity = self
            .params
            .ema_trend
            .max(self.params.macd_slow + self.params.macd_signal)
            + 64;
        self.indicators
            .entry((symbol.to_string(), timeframe))
            .or_insert_with(|| IndicatorSet::new(symbol, capacity))
    }

    fn scalar(&mut self, symbol: &str, timeframe: Timeframe, indicator: Indicator) -> Option<f64> {
        self.indicator_set(symbol, timeframe).get(indicator)?.scalar()
    }

    fn macd_bullish(&mut self, symbol: &str) -> Option<bool> {
        let key = Indicator::Macd {
            fast: self.params.macd_fast,
            slow: self.params.macd_slow,
            signal: self.params.macd_signal,
        };
        match self.indicator_set(symbol, self.params.primary_timeframe).get(key)? {
            IndicatorValue::Macd { line, signal, .. } => Some(line > signal),
            _ => None,
        }
    }

    /// Full multi-timeframe alignment check on a primary-timeframe close.
    /// Returns the chosen side and the entry snapshot.
    fn evaluate_entry(&mut self, candle: &Candle) -> Option<(OrderSide, IndicatorSnapshot, f64)> {
        let symbol = candle.symbol.clone();
        let price = candle.close.to_f64()?;
        let primary = self.params.primary_timeframe;

        let ema_fast = self.scalar(&symbol, primary, Indicator::Ema { period: self.params.ema_fast })?;
        let ema_slow = self.scalar(&symbol, primary, Indicator::Ema { period: self.params.ema_slow })?;
        let ema_mid = self.scalar(
            &symbol,
            self.params.mid_timeframe,
            Indicator::Ema { period: self.params.ema_mid },
        )?;
        let ema_trend = self.scalar(
            &symbol,
            self.params.trend_timeframe,
            Indicator::Ema { period: self.params.ema_trend },
        )?;
        let rsi = self.scalar(&symbol, primary, Indicator::Rsi { period: self.params.rsi_period })?;
        let atr = self.scalar(&symbol, primary, Indicator::Atr { period: self.params.atr_period })?;
        let volume_ma = self.scalar(
            &symbol,
            primary,
            Indicator::VolumeSma { period: self.params.volume_ma_period },
        )?;
        let macd_bullish = self.macd_bullish(&symbol)?;

        let volume_ok = candle.volume > volume_ma * self.params.volume_multiplier;
        let pullback_ok = (price - ema_fast).abs() < self.params.pullback_atr_limit * atr;

        let long_aligned = price > ema_slow
            && ema_fast > ema_slow
            && price > ema_mid
            && price > ema_trend
            && rsi >= self.params.rsi_long_min
            && rsi <= self.params.rsi_long_max
            && macd_bullish
            && volume_ok
            && pullback_ok;

        let short_aligned = price < ema_slow
            && ema_fast < ema_slow
            && price < ema_mid
            && price < ema_trend
            && rsi >= self.params.rsi_short_min
            && rsi <= self.params.rsi_short_max
            && !macd_bullish
            && volume_ok
            && pullback_ok;

        let side = if long_aligned {
            OrderSide::Buy
        } else if short_aligned {
            OrderSide::Sell
        } else {
            return None;
        };

        let mut snapshot = IndicatorSnapshot::new();
        snapshot.insert(format!("ema_{}", self.params.ema_fast), ema_fast);
        snapshot.insert(format!("ema_{}", self.params.ema_slow), ema_slow);
        snapshot.insert(format!("ema_mid_{}", self.params.ema_mid), ema_mid);
        snapshot.insert(format!("ema_trend_{}", self.params.ema_trend), ema_trend);
        snapshot.insert(format!("rsi_{}", self.params.rsi_period), rsi);
        snapshot.insert(format!("atr_{}", self.params.atr_period), atr);
        snapshot.insert("volume_ma".to_string(), volume_ma);
        Some((side, snapshot, atr))
    }

    /// `⌊(equity × risk_per_trade) / |entry − initial_stop|⌋`, where the
    /// stop distance is `atr_sl_mult × ATR`.
    fn position_size(&self, atr: f64) -> Option<Decimal> {
        let stop_distance = Decimal::from_f64(self.params.atr_sl_mult * atr)?;
        if stop_distance <= Decimal::ZERO {
            return None;
        }
        let risk_amount = self.equity * self.params.risk_per_trade;
        let quantity = (risk_amount / stop_distance).floor();
        if quantity < Decimal::ONE {
            return None;
        }
        Some(quantity)
    }

    fn exit_signal(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        timestamp: i64,
        reason: &str,
    ) -> Option<Signal> {
        let scalp = self.open_scalps.get(symbol)?;
        let close_side = scalp.side.opposite();
        Some(Signal::exit(
            self.id.clone(),
            symbol,
            close_side,
            price,
            quantity,
            timestamp,
            reason,
        ))
    }

    fn profit_in_atr(scalp: &OpenScalp, price: Decimal) -> f64 {
        if scalp.atr_at_entry <= 0.0 {
            return 0.0;
        }
        let favorable = match scalp.side {
            OrderSide::Buy => price - scalp.entry_price,
            OrderSide::Sell => scalp.entry_price - price,
        };
        favorable.to_f64().unwrap_or(0.0) / scalp.atr_at_entry
    }
}

impl Strategy for ScalpingMtfAtrStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &'static str {
        "scalping_mtf_atr"
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        let p = &self.params;
        if p.tp1_fraction + p.tp2_fraction > Decimal::ONE {
            anyhow::bail!(
                "tp1_fraction + tp2_fraction must not exceed 1.0 (got {} + {})",
                p.tp1_fraction,
                p.tp2_fraction
            );
        }
        if p.rsi_long_min > p.rsi_long_max || p.rsi_short_min > p.rsi_short_max {
            anyhow::bail!("rsi bands are inverted");
        }
        if p.ema_fast >= p.ema_slow {
            anyhow::bail!("ema_fast ({}) must be below ema_slow ({})", p.ema_fast, p.ema_slow);
        }
        Ok(())
    }

    fn warmup_candles_required(&self) -> usize {
        // The 200-period trend EMA is the binding requirement.
        self.params.ema_trend + 20
    }

    fn required_timeframes(&self) -> Vec<Timeframe> {
        vec![
            self.params.primary_timeframe,
            self.params.mid_timeframe,
            self.params.trend_timeframe,
        ]
    }

    fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    fn set_warmed_up(&mut self, warmed_up: bool) {
        self.warmed_up = warmed_up;
    }

    fn on_candle_closed(&mut self, candle: &Candle) -> Vec<Signal> {
        let timeframe = candle.timeframe;
        if !self.required_timeframes().contains(&timeframe) {
            return Vec::new();
        }
        let symbol = candle.symbol.clone();
        self.indicator_set(&symbol, timeframe).add_closed_candle(candle);
        self.last_price.insert(symbol.clone(), candle.close);

        if timeframe != self.params.primary_timeframe {
            return Vec::new();
        }
        if let Some(atr) =
            self.scalar(&symbol, timeframe, Indicator::Atr { period: self.params.atr_period })
        {
            self.current_atr.insert(symbol.clone(), atr);
        }

        if !self.warmed_up
            || self.entries_disabled
            || self.open_scalps.contains_key(&symbol)
            || self.open_scalps.len() >= self.params.max_positions
        {
            return Vec::new();
        }

        let Some((side, snapshot, atr)) = self.evaluate_entry(candle) else {
            return Vec::new();
        };
        let Some(quantity) = self.position_size(atr) else {
            return Vec::new();
        };

        info!(
            "ScalpingMtfAtr[{}]: {} alignment on {} at {} (qty {})",
            self.id, side, symbol, candle.close, quantity
        );
        vec![
            Signal::entry(
                self.id.clone(),
                symbol,
                side,
                candle.close,
                quantity,
                candle.end_timestamp(),
                "multi-timeframe alignment",
            )
            .with_indicators(snapshot),
        ]
    }

    fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
        self.last_price.insert(tick.symbol.clone(), tick.price);
        if !self.warmed_up {
            return Vec::new();
        }
        let Some(scalp) = self.open_scalps.get_mut(&tick.symbol) else {
            return Vec::new();
        };

        let is_long = scalp.side == OrderSide::Buy;
        if is_long {
            if tick.price > scalp.extreme {
                scalp.extreme = tick.price;
            }
        } else if tick.price < scalp.extreme {
            scalp.extreme = tick.price;
        }

        let atr = self
            .current_atr
            .get(&tick.symbol)
            .copied()
            .unwrap_or(scalp.atr_at_entry);
        let profit_atr = Self::profit_in_atr(scalp, tick.price);

        // Stop maintenance: breakeven first, then the trail. Once trailing is
        // active the stop never crosses back below (above) the entry.
        if profit_atr >= self.params.breakeven_atr {
            let entry = scalp.entry_price;
            tighten_stop(scalp, entry);
        }
        if profit_atr >= self.params.trailing_start_atr {
            scalp.trailing_active = true;
        }
        if scalp.trailing_active
            && let Some(distance) = Decimal::from_f64(self.params.atr_trail_mult * atr)
        {
            let candidate = if is_long {
                (scalp.extreme - distance).max(scalp.entry_price)
            } else {
                (scalp.extreme + distance).min(scalp.entry_price)
            };
            tighten_stop(scalp, candidate);
        }

        // Stop breach closes whatever remains.
        let stop_hit = if is_long { tick.price <= scalp.stop } else { tick.price >= scalp.stop };
        if stop_hit {
            let remaining = scalp.remaining;
            let reason = if scalp.trailing_active { "trailing_sl" } else { "stop_loss" };
            debug!(
                "ScalpingMtfAtr[{}]: stop on {} at {} ({})",
                self.id, tick.symbol, tick.price, reason
            );
            return self
                .exit_signal(&tick.symbol, remaining, tick.price, tick.timestamp, reason)
                .into_iter()
                .collect();
        }

        // Partial targets.
        let tp1_hit = !scalp.tp1_done
            && if is_long { tick.price >= scalp.tp1 } else { tick.price <= scalp.tp1 };
        if tp1_hit {
            scalp.tp1_done = true;
            let quantity = (scalp.initial_quantity * self.params.tp1_fraction)
                .floor()
                .max(Decimal::ONE)
                .min(scalp.remaining);
            return self
                .exit_signal(&tick.symbol, quantity, tick.price, tick.timestamp, "tp1")
                .into_iter()
                .collect();
        }

        let tp2_hit = scalp.tp1_done
            && !scalp.tp2_done
            && if is_long { tick.price >= scalp.tp2 } else { tick.price <= scalp.tp2 };
        if tp2_hit {
            scalp.tp2_done = true;
            let quantity = (scalp.initial_quantity * self.params.tp2_fraction)
                .floor()
                .max(Decimal::ONE)
                .min(scalp.remaining);
            return self
                .exit_signal(&tick.symbol, quantity, tick.price, tick.timestamp, "tp2")
                .into_iter()
                .collect();
        }

        Vec::new()
    }

    fn on_position_opened(&mut self, fill: &Fill) {
        if fill.intent != SignalIntent::Entry {
            return;
        }
        let atr = self
            .current_atr
            .get(&fill.symbol)
            .copied()
            .unwrap_or(0.0);
        let sl = Decimal::from_f64(self.params.atr_sl_mult * atr).unwrap_or(Decimal::ZERO);
        let tp1 = Decimal::from_f64(self.params.atr_tp1_mult * atr).unwrap_or(Decimal::ZERO);
        let tp2 = Decimal::from_f64(self.params.atr_tp2_mult * atr).unwrap_or(Decimal::ZERO);
        let is_long = fill.side == OrderSide::Buy;

        self.open_scalps.insert(
            fill.symbol.clone(),
            OpenScalp {
                side: fill.side,
                entry_price: fill.filled_price,
                initial_quantity: fill.quantity,
                remaining: fill.quantity,
                atr_at_entry: atr,
                stop: if is_long { fill.filled_price - sl } else { fill.filled_price + sl },
                tp1: if is_long { fill.filled_price + tp1 } else { fill.filled_price - tp1 },
                tp2: if is_long { fill.filled_price + tp2 } else { fill.filled_price - tp2 },
                tp1_done: false,
                tp2_done: false,
                trailing_active: false,
                extreme: fill.filled_price,
            },
        );
    }

    fn on_position_reduced(&mut self, fill: &Fill, remaining: Decimal) {
        if let Some(scalp) = self.open_scalps.get_mut(&fill.symbol) {
            scalp.remaining = remaining;
        }
    }

    fn on_position_closed(&mut self, fill: &Fill, realized_pnl: Decimal) {
        self.open_scalps.remove(&fill.symbol);
        self.equity += realized_pnl;
        self.daily_pnl += realized_pnl;

        if realized_pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
        } else if realized_pnl > Decimal::ZERO {
            self.consecutive_losses = 0;
        }

        let loss_floor = -self.equity * self.params.daily_loss_limit;
        if self.consecutive_losses >= self.params.max_consecutive_losses {
            if !self.entries_disabled {
                info!(
                    "ScalpingMtfAtr[{}]: {} consecutive losses, entries disabled for the day",
                    self.id, self.consecutive_losses
                );
            }
            self.entries_disabled = true;
        }
        if self.daily_pnl <= loss_floor {
            if !self.entries_disabled {
                info!(
                    "ScalpingMtfAtr[{}]: daily loss limit reached ({}), entries disabled",
                    self.id, self.daily_pnl
                );
            }
            self.entries_disabled = true;
        }
    }

    fn square_off_all(&mut self, timestamp: i64) -> Vec<Signal> {
        let symbols: Vec<String> = self.open_scalps.keys().cloned().collect();
        symbols
            .into_iter()
            .filter_map(|symbol| {
                let scalp = self.open_scalps.get(&symbol)?;
                let remaining = scalp.remaining;
                let price = self
                    .last_price
                    .get(&symbol)
                    .copied()
                    .unwrap_or(scalp.entry_price);
                self.exit_signal(&symbol, remaining, price, timestamp, "square_off")
            })
            .map(|signal| signal.with_origin(SignalOrigin::TimeController))
            .collect()
    }
}

fn tighten_stop(scalp: &mut OpenScalp, candidate: Decimal) {
    if scalp.side == OrderSide::Buy {
        if candidate > scalp.stop {
            scalp.stop = candidate;
        }
    } else if candidate < scalp.stop {
        scalp.stop = candidate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(side: OrderSide, price: f64, quantity: i64) -> Fill {
        Fill {
            trade_id: "sc_W_1".to_string(),
            strategy_id: "sc".to_string(),
            symbol: "W".to_string(),
            side,
            intent: SignalIntent::Entry,
            requested_price: Decimal::from_f64(price).unwrap(),
            filled_price: Decimal::from_f64(price).unwrap(),
            quantity: Decimal::from(quantity),
            timestamp: 0,
        }
    }

    fn tick(price: f64, timestamp: i64) -> Tick {
        Tick::from_mid(
            "W",
            Decimal::from_f64(price).unwrap(),
            dec!(0.001),
            1.0,
            timestamp,
            "test",
        )
    }

    fn strategy_with_position(atr: f64) -> ScalpingMtfAtrStrategy {
        let mut strategy = ScalpingMtfAtrStrategy::new("sc", ScalpingMtfAtrParams::default());
        strategy.set_warmed_up(true);
        strategy.current_atr.insert("W".to_string(), atr);
        strategy.on_position_opened(&fill(OrderSide::Buy, 100.0, 10));
        strategy
    }

    #[test]
    fn test_position_sizing_floor() {
        let strategy = ScalpingMtfAtrStrategy::new("sc", ScalpingMtfAtrParams::default());
        // equity 100000 × 1% = 1000 risk; stop distance 2.5 × 2 = 5 → 200.
        let quantity = strategy.position_size(2.0).unwrap();
        assert_eq!(quantity, dec!(200));

        // Stop distance too wide for even one unit.
        let quantity = strategy.position_size(800.0);
        assert!(quantity.is_none());
    }

    #[test]
    fn test_tp1_then_tp2_partial_exits() {
        // ATR 2: stop 95, tp1 104, tp2 106.
        let mut strategy = strategy_with_position(2.0);

        let signals = strategy.on_tick(&tick(104.0, 1_000));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "tp1");
        assert_eq!(signals[0].quantity, dec!(5));
        strategy.on_position_reduced(&fill(OrderSide::Sell, 104.0, 5), dec!(5));

        // tp1 does not re-fire; tp2 fires at 106.
        assert!(strategy.on_tick(&tick(104.5, 2_000)).is_empty());
        let signals = strategy.on_tick(&tick(106.0, 3_000));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "tp2");
        assert_eq!(signals[0].quantity, dec!(3));
    }

    #[test]
    fn test_initial_stop_closes_remaining() {
        let mut strategy = strategy_with_position(2.0);
        let signals = strategy.on_tick(&tick(94.9, 1_000));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "stop_loss");
        assert_eq!(signals[0].quantity, dec!(10));
        assert_eq!(signals[0].side, OrderSide::Sell);
    }

    #[test]
    fn test_trailing_clamps_to_entry() {
        let mut strategy = strategy_with_position(2.0);

        // +3 ATR (106): tp1 fires first; acknowledge the partial.
        let signals = strategy.on_tick(&tick(106.0, 1_000));
        assert_eq!(signals[0].reason, "tp1");
        strategy.on_position_reduced(&fill(OrderSide::Sell, 106.0, 5), dec!(5));

        // Extreme 110 → raw trail 110 − 4 = 106, already above entry.
        strategy.on_tick(&tick(110.0, 2_000));
        let stop = strategy.open_scalps.get("W").unwrap().stop;
        assert!(stop >= dec!(100), "trail must never cross entry, stop {stop}");

        // Pull back: trail stop triggers with the trailing reason.
        let signals = strategy.on_tick(&tick(105.9, 3_000));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "trailing_sl");
    }

    #[test]
    fn test_consecutive_losses_disable_entries() {
        let mut strategy = ScalpingMtfAtrStrategy::new("sc", ScalpingMtfAtrParams::default());
        strategy.set_warmed_up(true);

        for i in 0..3 {
            strategy.on_position_opened(&fill(OrderSide::Buy, 100.0, 10));
            let mut exit = fill(OrderSide::Sell, 99.0, 10);
            exit.intent = SignalIntent::Exit;
            exit.trade_id = format!("sc_W_{i}");
            strategy.on_position_closed(&exit, dec!(-100));
        }
        assert!(strategy.entries_disabled);
    }

    #[test]
    fn test_daily_loss_limit_disables_entries() {
        let mut strategy = ScalpingMtfAtrStrategy::new("sc", ScalpingMtfAtrParams::default());
        strategy.set_warmed_up(true);

        strategy.on_position_opened(&fill(OrderSide::Buy, 100.0, 10));
        let mut exit = fill(OrderSide::Sell, 99.0, 10);
        exit.intent = SignalIntent::Exit;
        // One catastrophic loss beyond 2.5% of equity.
        strategy.on_position_closed(&exit, dec!(-3000));
        assert!(strategy.entries_disabled);
        // A later win does not re-enable entries for the day.
        strategy.on_position_opened(&fill(OrderSide::Buy, 100.0, 10));
        let mut exit2 = fill(OrderSide::Sell, 101.0, 10);
        exit2.intent = SignalIntent::Exit;
        strategy.on_position_closed(&exit2, dec!(500));
        assert!(strategy.entries_disabled);
    }

    #[test]
    fn test_initialize_rejects_incoherent_fractions() {
        use crate::application::strategies::traits::Strategy;
        let params = ScalpingMtfAtrParams {
            tp1_fraction: dec!(0.7),
            tp2_fraction: dec!(0.5),
            ..Default::default()
        };
        let mut strategy = ScalpingMtfAtrStrategy::new("sc", params);
        assert!(strategy.initialize().is_err());

        let mut strategy = ScalpingMtfAtrStrategy::new("sc", ScalpingMtfAtrParams::default());
        assert!(strategy.initialize().is_ok());
    }

    #[test]
    fn test_short_scalp_mirrors_levels() {
        let mut strategy = ScalpingMtfAtrStrategy::new("sc", ScalpingMtfAtrParams::default());
        strategy.set_warmed_up(true);
        strategy.current_atr.insert("W".to_string(), 2.0);
        strategy.on_position_opened(&fill(OrderSide::Sell, 100.0, 10));

        let scalp = strategy.open_scalps.get("W").unwrap();
        assert_eq!(scalp.stop, dec!(105));
        assert_eq!(scalp.tp1, dec!(96));
        assert_eq!(scalp.tp2, dec!(94));

        let signals = strategy.on_tick(&tick(96.0, 1_000));
        assert_eq!(signals[0].reason, "tp1");
        assert_eq!(signals[0].side, OrderSide::Buy);
    }
}
