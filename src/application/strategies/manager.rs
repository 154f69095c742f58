use crate::application::risk_management::trailing_stops::TrailingSpec;
use crate::application::strategies::traits::Strategy;
use crate::domain::market::{Candle, Tick, Timeframe};
use crate::domain::trading::{Fill, Signal};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{error, warn};

struct StrategySlot {
    strategy: Box<dyn Strategy>,
    faulted: bool,
}

/// Fans ticks and closed candles out to every active strategy in
/// registration order and collects emitted signals in that same order.
///
/// A strategy that panics inside a callback is marked faulted and excluded
/// from all further dispatch; its open positions stay alive and are handled
/// by the trailing-stop manager and the time controller.
pub struct MultiStrategyManager {
    slots: Vec<StrategySlot>,
}

impl MultiStrategyManager {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.slots.push(StrategySlot { strategy, faulted: false });
    }

    /// Runs every strategy's one-time setup. A failure here is a startup
    /// error, not a runtime fault.
    pub fn initialize_all(&mut self) -> anyhow::Result<()> {
        for slot in &mut self.slots {
            slot.strategy
                .initialize()
                .map_err(|e| e.context(format!("initializing '{}'", slot.strategy.id())))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.strategy.id().to_string()).collect()
    }

    pub fn faulted_ids(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.faulted)
            .map(|s| s.strategy.id().to_string())
            .collect()
    }

    /// Union of every strategy's required timeframes, always including the
    /// 1-minute base the simulator and trailing stops ride on.
    pub fn required_timeframes(&self) -> Vec<Timeframe> {
        let mut set = BTreeSet::new();
        set.insert(Timeframe::OneMin);
        for slot in &self.slots {
            set.extend(slot.strategy.required_timeframes());
        }
        set.into_iter().collect()
    }

    pub fn max_warmup_candles(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.strategy.warmup_candles_required())
            .max()
            .unwrap_or(0)
    }

    pub fn set_all_warmed_up(&mut self) {
        for slot in &mut self.slots {
            slot.strategy.set_warmed_up(true);
        }
    }

    pub fn any_not_warmed_up(&self) -> bool {
        self.slots.iter().any(|s| !s.strategy.is_warmed_up())
    }

    /// Warmup candles populate indicators only; emitted signals (there must
    /// be none) are discarded.
    pub fn dispatch_warmup_candle(&mut self, candle: &Candle) {
        for slot in &mut self.slots {
            if slot.faulted {
                continue;
            }
            slot.strategy.on_warmup_candle(candle);
        }
    }

    pub fn dispatch_candle_closed(&mut self, candle: &Candle) -> Vec<Signal> {
        self.dispatch(|strategy| strategy.on_candle_closed(candle), "on_candle_closed")
    }

    pub fn dispatch_tick(&mut self, tick: &Tick) -> Vec<Signal> {
        self.dispatch(|strategy| strategy.on_tick(tick), "on_tick")
    }

    pub fn square_off_all(&mut self, timestamp: i64) -> Vec<Signal> {
        self.dispatch(|strategy| strategy.square_off_all(timestamp), "square_off_all")
    }

    pub fn notify_position_opened(&mut self, fill: &Fill) {
        if let Some(slot) = self.slot_mut(&fill.strategy_id) {
            slot.strategy.on_position_opened(fill);
        }
    }

    pub fn notify_position_reduced(&mut self, fill: &Fill, remaining: Decimal) {
        if let Some(slot) = self.slot_mut(&fill.strategy_id) {
            slot.strategy.on_position_reduced(fill, remaining);
        }
    }

    pub fn notify_position_closed(&mut self, fill: &Fill, realized_pnl: Decimal) {
        if let Some(slot) = self.slot_mut(&fill.strategy_id) {
            slot.strategy.on_position_closed(fill, realized_pnl);
        }
    }

    pub fn trailing_spec(&self, strategy_id: &str, symbol: &str) -> Option<TrailingSpec> {
        self.slots
            .iter()
            .find(|s| s.strategy.id() == strategy_id)
            .and_then(|s| s.strategy.trailing_spec(symbol))
    }

    fn slot_mut(&mut self, strategy_id: &str) -> Option<&mut StrategySlot> {
        self.slots
            .iter_mut()
            .find(|s| !s.faulted && s.strategy.id() == strategy_id)
    }

    fn dispatch<F>(&mut self, mut call: F, callback_name: &str) -> Vec<Signal>
    where
        F: FnMut(&mut Box<dyn Strategy>) -> Vec<Signal>,
    {
        let mut signals = Vec::new();
        for slot in &mut self.slots {
            if slot.faulted {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| call(&mut slot.strategy))) {
                Ok(emitted) => {
                    if !emitted.is_empty() && !slot.strategy.is_warmed_up() {
                        warn!(
                            "MultiStrategyManager: '{}' emitted {} signal(s) before warmup, dropped",
                            slot.strategy.id(),
                            emitted.len()
                        );
                        continue;
                    }
                    signals.extend(emitted);
                }
                Err(_) => {
                    error!(
                        "MultiStrategyManager: strategy '{}' panicked in {}, excluding it from \
                         further dispatch",
                        slot.strategy.id(),
                        callback_name
                    );
                    slot.faulted = true;
                }
            }
        }
        signals
    }
}

impl Default for MultiStrategyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::{OrderSide, SignalIntent};
    use rust_decimal_macros::dec;

    /// Scripted strategy for dispatch-order and fault tests.
    #[derive(Debug)]
    struct ScriptedStrategy {
        id: String,
        warmed_up: bool,
        panic_on_tick: bool,
        emit_on_tick: bool,
        ticks_seen: usize,
    }

    impl ScriptedStrategy {
        fn new(id: &str, emit_on_tick: bool) -> Self {
            Self {
                id: id.to_string(),
                warmed_up: true,
                panic_on_tick: false,
                emit_on_tick,
                ticks_seen: 0,
            }
        }
    }

    impl Strategy for ScriptedStrategy {
        fn id(&self) -> &str {
            &self.id
        }
        fn class_name(&self) -> &'static str {
            "scripted"
        }
        fn warmup_candles_required(&self) -> usize {
            5
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
        fn on_candle_closed(&mut self, _candle: &Candle) -> Vec<Signal> {
            Vec::new()
        }
        fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
            if self.panic_on_tick {
                panic!("scripted failure");
            }
            self.ticks_seen += 1;
            if self.emit_on_tick {
                vec![Signal::entry(
                    self.id.clone(),
                    tick.symbol.clone(),
                    OrderSide::Buy,
                    tick.price,
                    dec!(1),
                    tick.timestamp,
                    "scripted",
                )]
            } else {
                Vec::new()
            }
        }
        fn on_position_opened(&mut self, _fill: &Fill) {}
        fn on_position_closed(&mut self, _fill: &Fill, _pnl: Decimal) {}
        fn square_off_all(&mut self, _timestamp: i64) -> Vec<Signal> {
            Vec::new()
        }
    }

    fn tick() -> Tick {
        Tick::from_mid("A", dec!(100), dec!(0.001), 1.0, 0, "test")
    }

    #[test]
    fn test_signals_collected_in_registration_order() {
        let mut manager = MultiStrategyManager::new();
        manager.register(Box::new(ScriptedStrategy::new("first", true)));
        manager.register(Box::new(ScriptedStrategy::new("second", true)));

        let signals = manager.dispatch_tick(&tick());
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].strategy_id, "first");
        assert_eq!(signals[1].strategy_id, "second");
        assert_eq!(signals[0].intent, SignalIntent::Entry);
    }

    #[test]
    fn test_panicking_strategy_is_isolated() {
        let mut manager = MultiStrategyManager::new();
        let mut bad = ScriptedStrategy::new("bad", false);
        bad.panic_on_tick = true;
        manager.register(Box::new(bad));
        manager.register(Box::new(ScriptedStrategy::new("good", true)));

        // First dispatch: "bad" faults, "good" still emits.
        let signals = manager.dispatch_tick(&tick());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].strategy_id, "good");
        assert_eq!(manager.faulted_ids(), vec!["bad".to_string()]);

        // Faulted strategies are skipped afterwards.
        let signals = manager.dispatch_tick(&tick());
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn test_signals_dropped_before_warmup() {
        let mut manager = MultiStrategyManager::new();
        let mut eager = ScriptedStrategy::new("eager", true);
        eager.warmed_up = false;
        manager.register(Box::new(eager));

        assert!(manager.dispatch_tick(&tick()).is_empty());
        manager.set_all_warmed_up();
        assert_eq!(manager.dispatch_tick(&tick()).len(), 1);
    }

    #[test]
    fn test_required_timeframes_union_includes_base() {
        let manager = MultiStrategyManager::new();
        assert_eq!(manager.required_timeframes(), vec![Timeframe::OneMin]);
    }
}
