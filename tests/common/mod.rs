#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use intrasim::config::{Config, SimulationConfig, StrategyConfig, TimeConfig, WarmupConfig};
use intrasim::domain::market::{Candle, Tick, Timeframe};
use intrasim::domain::ports::DataManager;
use intrasim::domain::risk::RiskConfig;
use intrasim::domain::trading::{Fill, IndicatorSnapshot, Position, Signal};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::{Arc, Mutex};

pub fn sim_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

/// Milliseconds for a wall-clock time on the simulated day.
pub fn at(hour: i64, minute: i64) -> i64 {
    hour * 3_600_000 + minute * 60_000
}

pub fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap()
}

pub fn one_min_candle(symbol: &str, open: f64, high: f64, low: f64, close: f64, timestamp: i64) -> Candle {
    Candle::closed(
        symbol,
        Timeframe::OneMin,
        decimal(open),
        decimal(high),
        decimal(low),
        decimal(close),
        1000.0,
        timestamp,
    )
}

pub fn flat_candle(symbol: &str, close: f64, timestamp: i64) -> Candle {
    one_min_candle(symbol, close, close + 0.5, close - 0.5, close, timestamp)
}

/// Warmup history that parks Wilder RSI near zero: a slow constant decline.
/// The last close is `base - 0.5 * 30`.
pub fn declining_history(symbol: &str, base: f64, start_ts: i64) -> Vec<Candle> {
    (0..=30)
        .map(|i| flat_candle(symbol, base - 0.5 * i as f64, start_ts + i * 60_000))
        .collect()
}

/// Base config: seed 1, ten ticks per candle, 10 bps spread, fixed 5 bps
/// slippage, unthrottled.
pub fn base_config(symbols: &[&str], strategies_toml: &str) -> Config {
    let strategies: Vec<StrategyConfig> = toml::from_str::<toml::Value>(strategies_toml)
        .unwrap()
        .get("strategies")
        .cloned()
        .map(|v| v.try_into().unwrap())
        .unwrap_or_default();

    Config {
        simulation: SimulationConfig {
            date: sim_date(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            seed: 1,
            ticks_per_candle: 10,
            spread: 0.001,
            speed: 0,
            slippage_min: 0.0005,
            slippage_max: 0.0005,
            data_dir: "data".to_string(),
        },
        risk: RiskConfig::default(),
        time: TimeConfig::default(),
        warmup: WarmupConfig::default(),
        strategies,
    }
}

#[derive(Debug, Clone)]
pub struct SignalRecord {
    pub signal: Signal,
    pub approved: bool,
    pub reason: String,
}

/// DataManager that records what flowed through it, for assertions.
#[derive(Default)]
pub struct RecordingDataManager {
    pub signals: Mutex<Vec<SignalRecord>>,
    pub opens: Mutex<Vec<Fill>>,
    pub closes: Mutex<Vec<(Fill, Decimal)>>,
}

impl RecordingDataManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signals(&self) -> Vec<SignalRecord> {
        self.signals.lock().unwrap().clone()
    }

    pub fn opens(&self) -> Vec<Fill> {
        self.opens.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<(Fill, Decimal)> {
        self.closes.lock().unwrap().clone()
    }

    pub fn rejected_with(&self, reason: &str) -> usize {
        self.signals()
            .iter()
            .filter(|r| !r.approved && r.reason == reason)
            .count()
    }
}

/// TradingSystem wired with the simulated broker at a fixed 5 bps slippage.
pub fn build_system(
    config: Config,
    adapter: Arc<dyn intrasim::domain::ports::DataAdapter>,
    data_manager: Arc<RecordingDataManager>,
) -> intrasim::application::system::TradingSystem {
    let broker: Arc<dyn intrasim::domain::ports::Broker> =
        Arc::new(intrasim::infrastructure::broker::SimulatedBroker::new(
            config.risk.initial_capital,
            Box::new(intrasim::infrastructure::simulation::UniformSlippage::fixed(0.0005)),
        ));
    intrasim::application::system::TradingSystem::new(config, adapter, broker, data_manager)
        .expect("system construction")
}

#[async_trait]
impl DataManager for RecordingDataManager {
    async fn log_signal(&self, signal: &Signal, approved: bool, reason: &str) {
        self.signals.lock().unwrap().push(SignalRecord {
            signal: signal.clone(),
            approved,
            reason: reason.to_string(),
        });
    }

    async fn log_trade_open(&self, fill: &Fill) {
        self.opens.lock().unwrap().push(fill.clone());
    }

    async fn log_trade_close(&self, fill: &Fill, realized_pnl: Decimal) {
        self.closes.lock().unwrap().push((fill.clone(), realized_pnl));
    }

    async fn log_position_update(&self, _position: &Position) {}
    async fn log_indicator_values(&self, _symbol: &str, _values: &IndicatorSnapshot) {}
    async fn log_candle(&self, _candle: &Candle) {}
    async fn update_trailing_sl(&self, _trade_id: &str, _stop: Decimal) {}
    async fn log_tick(&self, _tick: &Tick) {}
    async fn get_daily_summary(&self) -> Option<serde_json::Value> {
        None
    }
}
