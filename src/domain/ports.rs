use crate::domain::market::{Candle, Tick, Timeframe};
use crate::domain::trading::{Fill, IndicatorSnapshot, OrderRequest, OrderResult, Position, Signal};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Historical data provider consumed by the core. Implementations live in
/// `infrastructure::data`.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    async fn list_symbols(&self) -> Result<Vec<String>>;

    async fn available_dates(&self, symbol: &str) -> Result<Vec<NaiveDate>>;

    /// 1-minute OHLC for one trading day, chronological, no gaps within the
    /// session.
    async fn load_day(&self, date: NaiveDate, symbol: &str) -> Result<Vec<Candle>>;

    /// Most recent `n` closed candles strictly before `date` at the requested
    /// timeframe. May return fewer when history is short.
    async fn load_recent_closed(
        &self,
        date: NaiveDate,
        symbol: &str,
        n: usize,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub capital: Decimal,
    pub buying_power: Decimal,
}

/// Order execution contract. The simulated broker returns a terminal
/// (filled | rejected) result synchronously; real-broker adapters must
/// translate asynchronous fills into the same terminal results before
/// yielding control.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn submit(&self, request: OrderRequest) -> Result<OrderResult>;

    async fn account(&self) -> Result<AccountInfo>;
}

/// Observability sink. Every method is fire-and-forget: implementations
/// swallow their own failures and must never block or fail the pipeline.
/// Nothing here is consulted for correctness decisions.
#[async_trait]
pub trait DataManager: Send + Sync {
    async fn log_signal(&self, signal: &Signal, approved: bool, reason: &str);

    async fn log_trade_open(&self, fill: &Fill);

    async fn log_trade_close(&self, fill: &Fill, realized_pnl: Decimal);

    async fn log_position_update(&self, position: &Position);

    async fn log_indicator_values(&self, symbol: &str, values: &IndicatorSnapshot);

    async fn log_candle(&self, candle: &Candle);

    async fn update_trailing_sl(&self, trade_id: &str, stop: Decimal);

    async fn log_tick(&self, tick: &Tick);

    async fn get_daily_summary(&self) -> Option<serde_json::Value>;
}
