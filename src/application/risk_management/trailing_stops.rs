//! Per-position trailing stop-loss management.
//!
//! One `TrailingState` exists per open trade that declared a trailing spec.
//! The manager subscribes to fills (to create and remove state), to closed
//! candles (to refresh the indicator history the atr/ma policies read) and to
//! ticks (to ratchet stops and detect breaches).
//!
//! Invariant: for a long position the stop is monotonically non-decreasing
//! from initialization until the stop is hit or the trade is closed;
//! symmetric for shorts.

use crate::application::indicators::{Indicator, IndicatorSet};
use crate::domain::market::{Candle, Tick};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

const INDICATOR_HISTORY: usize = 256;

/// How the stop level evolves after entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TrailingPolicy {
    /// Stop fixed at entry ± pct forever.
    FixedPct { pct: Decimal },
    /// Stop trails the best price seen by `multiplier × ATR(period)`.
    Atr { multiplier: Decimal, period: usize },
    /// Stop rides a moving average with a safety buffer.
    Ma { period: usize, buffer_pct: Decimal },
    /// Effective stop distance decays linearly from `initial_pct` to
    /// `final_pct` over `decay_minutes`.
    TimeDecay {
        initial_pct: Decimal,
        final_pct: Decimal,
        decay_minutes: i64,
    },
}

/// What a strategy declares for positions it opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingSpec {
    #[serde(flatten)]
    pub policy: TrailingPolicy,
    /// Once unrealized profit crosses this fraction, the stop is clamped to
    /// entry for the rest of the trade.
    pub breakeven_trigger_pct: Option<Decimal>,
}

/// Live trailing state for one trade.
#[derive(Debug, Clone)]
pub struct TrailingState {
    pub trade_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub policy: TrailingPolicy,
    pub is_long: bool,
    pub entry_price: Decimal,
    pub entry_timestamp: i64,
    pub stop: Decimal,
    /// Highest price seen for longs, lowest for shorts.
    pub extreme: Decimal,
    pub breakeven_trigger_pct: Option<Decimal>,
    pub breakeven_applied: bool,
    pub activated: bool,
}

/// A stop breach observed on a tick. The orchestrator turns this into a
/// synthetic exit signal for the position's full remaining quantity.
#[derive(Debug, Clone)]
pub struct TrailingBreach {
    pub trade_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub stop: Decimal,
    pub price: Decimal,
    pub timestamp: i64,
}

pub struct TrailingStopManager {
    states: HashMap<String, TrailingState>,
    indicators: HashMap<String, IndicatorSet>,
}

impl TrailingStopManager {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            indicators: HashMap::new(),
        }
    }

    pub fn state(&self, trade_id: &str) -> Option<&TrailingState> {
        self.states.get(trade_id)
    }

    pub fn active_count(&self) -> usize {
        self.states.len()
    }

    /// Registers trailing state when an entry fill arrives.
    pub fn on_position_opened(
        &mut self,
        trade_id: &str,
        strategy_id: &str,
        symbol: &str,
        is_long: bool,
        entry_price: Decimal,
        entry_timestamp: i64,
        spec: TrailingSpec,
    ) {
        let stop = match spec.policy {
            TrailingPolicy::FixedPct { pct } | TrailingPolicy::TimeDecay { initial_pct: pct, .. } => {
                initial_stop(entry_price, pct, is_long)
            }
            TrailingPolicy::Atr { multiplier, period } => {
                let atr = self.indicator_value(symbol, Indicator::Atr { period });
                match atr.and_then(Decimal::from_f64) {
                    Some(atr) if is_long => entry_price - multiplier * atr,
                    Some(atr) => entry_price + multiplier * atr,
                    // ATR not ready yet: start from the entry price and let
                    // the first update establish the distance.
                    None => entry_price,
                }
            }
            TrailingPolicy::Ma { period, buffer_pct } => {
                let ma = self.indicator_value(symbol, Indicator::Sma { period });
                match ma.and_then(Decimal::from_f64) {
                    Some(ma) if is_long => ma * (Decimal::ONE - buffer_pct),
                    Some(ma) => ma * (Decimal::ONE + buffer_pct),
                    None => initial_stop(entry_price, Decimal::new(2, 2), is_long),
                }
            }
        };

        info!(
            "TrailingStopManager: tracking {} ({} {}) entry={} stop={}",
            trade_id,
            symbol,
            if is_long { "long" } else { "short" },
            entry_price,
            stop
        );

        self.states.insert(
            trade_id.to_string(),
            TrailingState {
                trade_id: trade_id.to_string(),
                strategy_id: strategy_id.to_string(),
                symbol: symbol.to_string(),
                policy: spec.policy,
                is_long,
                entry_price,
                entry_timestamp,
                stop,
                extreme: entry_price,
                breakeven_trigger_pct: spec.breakeven_trigger_pct,
                breakeven_applied: false,
                activated: true,
            },
        );
    }

    /// Purges state once the trade is closed (by any exit path).
    pub fn on_position_closed(&mut self, trade_id: &str) {
        if self.states.remove(trade_id).is_some() {
            debug!("TrailingStopManager: released {}", trade_id);
        }
    }

    /// Keeps the atr/ma policy inputs current. Only 1-minute candles feed the
    /// shared per-symbol history.
    pub fn on_candle_closed(&mut self, candle: &Candle) {
        if candle.timeframe != crate::domain::market::Timeframe::OneMin {
            return;
        }
        self.indicators
            .entry(candle.symbol.clone())
            .or_insert_with(|| IndicatorSet::new(candle.symbol.clone(), INDICATOR_HISTORY))
            .add_closed_candle(candle);
    }

    /// Ratchets stops for every tracked position on this tick and returns
    /// any breaches.
    pub fn on_tick(&mut self, tick: &Tick) -> Vec<TrailingBreach> {
        // Indicator reads need &mut on a sibling map, so run two passes:
        // snapshot the policies first, then compute inputs, then mutate.
        let tracked: Vec<(String, TrailingPolicy)> = self
            .states
            .values()
            .filter(|state| state.symbol == tick.symbol)
            .map(|state| (state.trade_id.clone(), state.policy))
            .collect();

        let mut policy_inputs: HashMap<String, (Option<f64>, Option<f64>)> = HashMap::new();
        for (trade_id, policy) in tracked {
            let input = match policy {
                TrailingPolicy::Atr { period, .. } => (
                    self.indicator_value(&tick.symbol, Indicator::Atr { period }),
                    None,
                ),
                TrailingPolicy::Ma { period, .. } => (
                    None,
                    self.indicator_value(&tick.symbol, Indicator::Sma { period }),
                ),
                _ => (None, None),
            };
            policy_inputs.insert(trade_id, input);
        }

        let mut breaches = Vec::new();
        for state in self.states.values_mut() {
            if state.symbol != tick.symbol {
                continue;
            }
            let (atr, ma) = policy_inputs
                .get(&state.trade_id)
                .copied()
                .unwrap_or((None, None));
            update_state(state, tick, atr, ma);

            let breached = if state.is_long {
                tick.price <= state.stop
            } else {
                tick.price >= state.stop
            };
            if breached {
                info!(
                    "TrailingStopManager: stop hit for {} at {} (stop {})",
                    state.trade_id, tick.price, state.stop
                );
                breaches.push(TrailingBreach {
                    trade_id: state.trade_id.clone(),
                    strategy_id: state.strategy_id.clone(),
                    symbol: state.symbol.clone(),
                    stop: state.stop,
                    price: tick.price,
                    timestamp: tick.timestamp,
                });
            }
        }
        breaches
    }

    fn indicator_value(&mut self, symbol: &str, indicator: Indicator) -> Option<f64> {
        self.indicators
            .get_mut(symbol)?
            .get(indicator)?
            .scalar()
    }
}

impl Default for TrailingStopManager {
    fn default() -> Self {
        Self::new()
    }
}

fn initial_stop(entry: Decimal, pct: Decimal, is_long: bool) -> Decimal {
    if is_long {
        entry * (Decimal::ONE - pct)
    } else {
        entry * (Decimal::ONE + pct)
    }
}

/// Applies one tick to one state. Stops only ever tighten.
fn update_state(state: &mut TrailingState, tick: &Tick, atr: Option<f64>, ma: Option<f64>) {
    if state.is_long {
        if tick.price > state.extreme {
            state.extreme = tick.price;
        }
    } else if tick.price < state.extreme {
        state.extreme = tick.price;
    }

    let candidate = match state.policy {
        TrailingPolicy::FixedPct { .. } => None,
        TrailingPolicy::Atr { multiplier, .. } => atr.and_then(Decimal::from_f64).map(|atr| {
            if state.is_long {
                state.extreme - multiplier * atr
            } else {
                state.extreme + multiplier * atr
            }
        }),
        TrailingPolicy::Ma { buffer_pct, .. } => ma.and_then(Decimal::from_f64).map(|ma| {
            if state.is_long {
                ma * (Decimal::ONE - buffer_pct)
            } else {
                ma * (Decimal::ONE + buffer_pct)
            }
        }),
        TrailingPolicy::TimeDecay {
            initial_pct,
            final_pct,
            decay_minutes,
        } => {
            let elapsed_min = (tick.timestamp - state.entry_timestamp) as f64 / 60_000.0;
            let progress = if decay_minutes <= 0 {
                1.0
            } else {
                (elapsed_min / decay_minutes as f64).clamp(0.0, 1.0)
            };
            let effective = initial_pct
                + (final_pct - initial_pct)
                    * Decimal::from_f64(progress).unwrap_or(Decimal::ZERO);
            Some(initial_stop(state.entry_price, effective, state.is_long))
        }
    };

    if let Some(candidate) = candidate {
        tighten(state, candidate);
    }

    // Breakeven clamp, applied once crossed and kept for the trade's life.
    if let Some(trigger) = state.breakeven_trigger_pct
        && !state.breakeven_applied
    {
        let profit_pct = profit_fraction(state, tick.price);
        if profit_pct >= trigger {
            state.breakeven_applied = true;
            tighten(state, state.entry_price);
            debug!(
                "TrailingStopManager: breakeven clamp for {} (stop {})",
                state.trade_id, state.stop
            );
        }
    }
}

fn tighten(state: &mut TrailingState, candidate: Decimal) {
    if state.is_long {
        if candidate > state.stop {
            state.stop = candidate;
        }
    } else if candidate < state.stop {
        state.stop = candidate;
    }
}

fn profit_fraction(state: &TrailingState, price: Decimal) -> Decimal {
    if state.entry_price.is_zero() {
        return Decimal::ZERO;
    }
    let raw = (price - state.entry_price) / state.entry_price;
    if state.is_long { raw } else { -raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(price: Decimal, timestamp: i64) -> Tick {
        Tick::from_mid("Y", price, dec!(0.001), 1.0, timestamp, "test")
    }

    fn manager_with_atr(atr_target: f64) -> TrailingStopManager {
        // Feed flat candles with a constant range so Wilder ATR equals the
        // range exactly.
        let mut manager = TrailingStopManager::new();
        for i in 0..30 {
            let candle = Candle::closed(
                "Y",
                crate::domain::market::Timeframe::OneMin,
                dec!(100),
                Decimal::from_f64(100.0 + atr_target).unwrap(),
                dec!(100),
                dec!(100),
                10.0,
                i * 60_000,
            );
            manager.on_candle_closed(&candle);
        }
        manager
    }

    fn spec_atr(multiplier: Decimal, period: usize) -> TrailingSpec {
        TrailingSpec {
            policy: TrailingPolicy::Atr { multiplier, period },
            breakeven_trigger_pct: None,
        }
    }

    #[test]
    fn test_fixed_pct_never_moves() {
        let mut manager = TrailingStopManager::new();
        manager.on_position_opened(
            "t1",
            "s1",
            "Y",
            true,
            dec!(100),
            0,
            TrailingSpec {
                policy: TrailingPolicy::FixedPct { pct: dec!(0.05) },
                breakeven_trigger_pct: None,
            },
        );
        assert_eq!(manager.state("t1").unwrap().stop, dec!(95));

        // Large favorable excursion: the stop must not budge.
        for (i, price) in [dec!(120), dec!(150), dec!(200)].into_iter().enumerate() {
            let breaches = manager.on_tick(&tick(price, (i as i64 + 1) * 1_000));
            assert!(breaches.is_empty());
            assert_eq!(manager.state("t1").unwrap().stop, dec!(95));
        }

        let breaches = manager.on_tick(&tick(dec!(94.5), 10_000));
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].stop, dec!(95));
    }

    #[test]
    fn test_atr_policy_ratchets_then_fires() {
        // ATR = 2, multiplier = 2.5, entry = 100 → initial stop 95.
        let mut manager = manager_with_atr(2.0);
        manager.on_position_opened("t1", "s1", "Y", true, dec!(100), 0, spec_atr(dec!(2.5), 14));
        assert_eq!(manager.state("t1").unwrap().stop, dec!(95));

        let path = [
            (dec!(105), dec!(100)),
            (dec!(110), dec!(105)),
            (dec!(108), dec!(105)),
            (dec!(107), dec!(105)),
        ];
        for (i, (price, expected_stop)) in path.into_iter().enumerate() {
            let breaches = manager.on_tick(&tick(price, (i as i64 + 1) * 1_000));
            assert!(breaches.is_empty(), "no breach expected at {}", price);
            assert_eq!(manager.state("t1").unwrap().stop, expected_stop);
        }

        // 106.25 stays above the 105 stop; 104.9 fires.
        assert!(manager.on_tick(&tick(dec!(106.25), 5_000)).is_empty());
        let breaches = manager.on_tick(&tick(dec!(104.9), 6_000));
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].trade_id, "t1");
        assert_eq!(breaches[0].stop, dec!(105));
    }

    #[test]
    fn test_short_position_trails_down() {
        let mut manager = manager_with_atr(2.0);
        manager.on_position_opened("t1", "s1", "Y", false, dec!(100), 0, spec_atr(dec!(2), 14));
        assert_eq!(manager.state("t1").unwrap().stop, dec!(104));

        manager.on_tick(&tick(dec!(94), 1_000));
        assert_eq!(manager.state("t1").unwrap().stop, dec!(98));

        // Stop never loosens back up.
        manager.on_tick(&tick(dec!(96), 2_000));
        assert_eq!(manager.state("t1").unwrap().stop, dec!(98));

        let breaches = manager.on_tick(&tick(dec!(98.5), 3_000));
        assert_eq!(breaches.len(), 1);
    }

    #[test]
    fn test_time_decay_tightens_with_age() {
        let mut manager = TrailingStopManager::new();
        manager.on_position_opened(
            "t1",
            "s1",
            "Y",
            true,
            dec!(100),
            0,
            TrailingSpec {
                policy: TrailingPolicy::TimeDecay {
                    initial_pct: dec!(0.02),
                    final_pct: dec!(0.005),
                    decay_minutes: 30,
                },
                breakeven_trigger_pct: None,
            },
        );
        assert_eq!(manager.state("t1").unwrap().stop, dec!(98));

        // Halfway through the decay the effective distance is 1.25%.
        manager.on_tick(&tick(dec!(100), 15 * 60_000));
        assert_eq!(manager.state("t1").unwrap().stop, dec!(98.75));

        // Past the full decay window it pins at the final distance.
        manager.on_tick(&tick(dec!(100), 60 * 60_000));
        assert_eq!(manager.state("t1").unwrap().stop, dec!(99.5));
    }

    #[test]
    fn test_breakeven_clamp_applies_once() {
        let mut manager = TrailingStopManager::new();
        manager.on_position_opened(
            "t1",
            "s1",
            "Y",
            true,
            dec!(100),
            0,
            TrailingSpec {
                policy: TrailingPolicy::FixedPct { pct: dec!(0.05) },
                breakeven_trigger_pct: Some(dec!(0.01)),
            },
        );
        assert_eq!(manager.state("t1").unwrap().stop, dec!(95));

        // +1% crossed: stop clamps to entry.
        manager.on_tick(&tick(dec!(101.5), 1_000));
        let state = manager.state("t1").unwrap();
        assert_eq!(state.stop, dec!(100));
        assert!(state.breakeven_applied);

        // Price falling back to entry hits the clamped stop.
        let breaches = manager.on_tick(&tick(dec!(100), 2_000));
        assert_eq!(breaches.len(), 1);
    }

    #[test]
    fn test_state_removed_on_close() {
        let mut manager = TrailingStopManager::new();
        manager.on_position_opened(
            "t1",
            "s1",
            "Y",
            true,
            dec!(100),
            0,
            TrailingSpec {
                policy: TrailingPolicy::FixedPct { pct: dec!(0.01) },
                breakeven_trigger_pct: None,
            },
        );
        assert_eq!(manager.active_count(), 1);
        manager.on_position_closed("t1");
        assert_eq!(manager.active_count(), 0);
        assert!(manager.on_tick(&tick(dec!(90), 1_000)).is_empty());
    }
}
