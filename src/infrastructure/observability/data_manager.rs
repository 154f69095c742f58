use crate::domain::market::{Candle, Tick};
use crate::domain::ports::DataManager;
use crate::domain::trading::{Fill, IndicatorSnapshot, Position, Signal};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

/// Emits every observability record as a structured debug event. All methods
/// are infallible by signature: nothing here can stall or fail the pipeline.
pub struct TracingDataManager;

#[async_trait]
impl DataManager for TracingDataManager {
    async fn log_signal(&self, signal: &Signal, approved: bool, reason: &str) {
        let payload = serde_json::to_string(signal).unwrap_or_default();
        debug!(target: "intrasim::observability", approved, reason, signal = %payload, "signal");
    }

    async fn log_trade_open(&self, fill: &Fill) {
        let payload = serde_json::to_string(fill).unwrap_or_default();
        debug!(target: "intrasim::observability", fill = %payload, "trade_open");
    }

    async fn log_trade_close(&self, fill: &Fill, realized_pnl: Decimal) {
        let payload = serde_json::to_string(fill).unwrap_or_default();
        debug!(target: "intrasim::observability", %realized_pnl, fill = %payload, "trade_close");
    }

    async fn log_position_update(&self, position: &Position) {
        debug!(
            target: "intrasim::observability",
            trade_id = %position.trade_id,
            price = %position.current_price,
            unrealized = %position.unrealized_pnl,
            "position_update"
        );
    }

    async fn log_indicator_values(&self, symbol: &str, values: &IndicatorSnapshot) {
        debug!(target: "intrasim::observability", symbol, ?values, "indicators");
    }

    async fn log_candle(&self, candle: &Candle) {
        debug!(
            target: "intrasim::observability",
            symbol = %candle.symbol,
            timeframe = %candle.timeframe,
            close = %candle.close,
            timestamp = candle.timestamp,
            "candle_closed"
        );
    }

    async fn update_trailing_sl(&self, trade_id: &str, stop: Decimal) {
        debug!(target: "intrasim::observability", trade_id, %stop, "trailing_sl");
    }

    async fn log_tick(&self, tick: &Tick) {
        debug!(
            target: "intrasim::observability",
            symbol = %tick.symbol,
            price = %tick.price,
            timestamp = tick.timestamp,
            "tick"
        );
    }

    async fn get_daily_summary(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Discards everything. Default sink for tests.
pub struct NullDataManager;

#[async_trait]
impl DataManager for NullDataManager {
    async fn log_signal(&self, _signal: &Signal, _approved: bool, _reason: &str) {}
    async fn log_trade_open(&self, _fill: &Fill) {}
    async fn log_trade_close(&self, _fill: &Fill, _realized_pnl: Decimal) {}
    async fn log_position_update(&self, _position: &Position) {}
    async fn log_indicator_values(&self, _symbol: &str, _values: &IndicatorSnapshot) {}
    async fn log_candle(&self, _candle: &Candle) {}
    async fn update_trailing_sl(&self, _trade_id: &str, _stop: Decimal) {}
    async fn log_tick(&self, _tick: &Tick) {}
    async fn get_daily_summary(&self) -> Option<serde_json::Value> {
        None
    }
}
