use crate::application::risk_management::trailing_stops::TrailingSpec;
use crate::domain::market::{Candle, Tick, Timeframe};
use crate::domain::trading::{Fill, Signal};
use anyhow::Result;
use rust_decimal::Decimal;

/// A polymorphic signal source.
///
/// Strategies receive closed candles for their declared timeframes and every
/// tick, in registration order, and return the signals they want considered.
/// They own only their indicator sets and a per-symbol view of "do I hold
/// this symbol"; positions themselves belong to the position manager.
///
/// No implementation may emit a signal while `is_warmed_up` is false.
pub trait Strategy: Send + std::fmt::Debug {
    /// Unique instance id; stamped on every emitted signal.
    fn id(&self) -> &str;

    fn class_name(&self) -> &'static str;

    /// One-time setup after construction, before warmup. The place for
    /// cross-parameter validation that serde defaults cannot express.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Closed candles (per required timeframe) this strategy wants replayed
    /// before going live.
    fn warmup_candles_required(&self) -> usize;

    fn required_timeframes(&self) -> Vec<Timeframe>;

    fn is_warmed_up(&self) -> bool;

    fn set_warmed_up(&mut self, warmed_up: bool);

    /// Warmup-phase candle: populate indicator state only. Routed through the
    /// same logic as live closes so warmup and live produce identical
    /// indicator paths; any signals are discarded by contract since
    /// `is_warmed_up` is still false.
    fn on_warmup_candle(&mut self, candle: &Candle) {
        let _ = self.on_candle_closed(candle);
    }

    /// A candle for one of this strategy's timeframes closed.
    fn on_candle_closed(&mut self, candle: &Candle) -> Vec<Signal>;

    /// High-frequency path. Hard stops belong here; most logic should wait
    /// for candle closes.
    fn on_tick(&mut self, tick: &Tick) -> Vec<Signal>;

    /// An entry fill for this strategy was applied.
    fn on_position_opened(&mut self, fill: &Fill);

    /// A partial exit was applied; `remaining` is the unsigned quantity left.
    fn on_position_reduced(&mut self, _fill: &Fill, _remaining: Decimal) {}

    /// The position for `fill.symbol` is fully closed.
    fn on_position_closed(&mut self, fill: &Fill, realized_pnl: Decimal);

    /// Emit exits for every held symbol, bypassing minimum-hold checks. Used
    /// by the time controller at square-off and by the orchestrator on stop.
    fn square_off_all(&mut self, timestamp: i64) -> Vec<Signal>;

    /// Trailing policy the trailing-stop manager should run for positions
    /// this strategy opens in `symbol`. `None` keeps exits fully in-strategy.
    fn trailing_spec(&self, _symbol: &str) -> Option<TrailingSpec> {
        None
    }
}
