use crate::application::indicators::calc;
use crate::domain::market::Candle;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

/// An indicator request: kind plus its parameters. Parameters use `Decimal`
/// so the whole key is hashable for the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Atr { period: usize },
    Bollinger { period: usize, k: Decimal },
    Macd { fast: usize, slow: usize, signal: usize },
    Supertrend { period: usize, multiplier: Decimal },
    VolumeSma { period: usize },
}

impl Indicator {
    /// Closed candles needed before this indicator is defined.
    pub fn required_candles(&self) -> usize {
        match *self {
            Indicator::Sma { period }
            | Indicator::Ema { period }
            | Indicator::Atr { period }
            | Indicator::Bollinger { period, .. }
            | Indicator::Supertrend { period, .. }
            | Indicator::VolumeSma { period } => period,
            Indicator::Rsi { period } => period + 1,
            Indicator::Macd { slow, signal, .. } => slow + signal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Scalar(f64),
    Bands { upper: f64, middle: f64, lower: f64 },
    Macd { line: f64, signal: f64, histogram: f64 },
    Supertrend { value: f64, bullish: bool },
}

impl IndicatorValue {
    /// The single-number view, where one exists.
    pub fn scalar(&self) -> Option<f64> {
        match *self {
            IndicatorValue::Scalar(v) => Some(v),
            IndicatorValue::Supertrend { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Per-symbol indicator state: bounded OHLCV history from closed candles, an
/// optional forming-candle snapshot, and a cache keyed by the full indicator
/// request.
///
/// The cache is invalidated atomically when a closed candle is appended.
/// Forming-candle overlays never touch the cache or the stored history.
#[derive(Debug)]
pub struct IndicatorSet {
    symbol: String,
    capacity: usize,
    opens: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    volumes: Vec<f64>,
    forming: Option<Ohlcv>,
    cache: HashMap<Indicator, IndicatorValue>,
}

#[derive(Debug, Clone, Copy)]
struct Ohlcv {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn ohlcv_of(candle: &Candle) -> Ohlcv {
    Ohlcv {
        open: candle.open.to_f64().unwrap_or_default(),
        high: candle.high.to_f64().unwrap_or_default(),
        low: candle.low.to_f64().unwrap_or_default(),
        close: candle.close.to_f64().unwrap_or_default(),
        volume: candle.volume,
    }
}

impl IndicatorSet {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            capacity: capacity.max(1),
            opens: Vec::new(),
            highs: Vec::new(),
            lows: Vec::new(),
            closes: Vec::new(),
            volumes: Vec::new(),
            forming: None,
            cache: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn closed_len(&self) -> usize {
        self.closes.len()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// Appends a closed candle and invalidates all cached values.
    pub fn add_closed_candle(&mut self, candle: &Candle) {
        let bar = ohlcv_of(candle);
        self.opens.push(bar.open);
        self.highs.push(bar.high);
        self.lows.push(bar.low);
        self.closes.push(bar.close);
        self.volumes.push(bar.volume);

        if self.closes.len() > self.capacity {
            let excess = self.closes.len() - self.capacity;
            self.opens.drain(..excess);
            self.highs.drain(..excess);
            self.lows.drain(..excess);
            self.closes.drain(..excess);
            self.volumes.drain(..excess);
        }

        self.forming = None;
        self.cache.clear();
    }

    /// Snapshots the current forming candle for `get_with_forming`.
    pub fn set_forming(&mut self, candle: &Candle) {
        self.forming = Some(ohlcv_of(candle));
    }

    pub fn is_ready(&self, indicator: Indicator) -> bool {
        self.closes.len() >= indicator.required_candles()
    }

    /// Indicator value over closed history only. Cached until the next
    /// closed candle arrives.
    pub fn get(&mut self, indicator: Indicator) -> Option<IndicatorValue> {
        if let Some(value) = self.cache.get(&indicator) {
            return Some(*value);
        }
        let value = compute(indicator, &self.opens, &self.highs, &self.lows, &self.closes, &self.volumes)?;
        self.cache.insert(indicator, value);
        Some(value)
    }

    /// Indicator value as if the forming candle were the last closed bar.
    /// Falls back to closed history when no forming candle is set. Never
    /// cached and never mutates stored history.
    pub fn get_with_forming(&self, indicator: Indicator) -> Option<IndicatorValue> {
        let Some(forming) = self.forming else {
            return compute(
                indicator,
                &self.opens,
                &self.highs,
                &self.lows,
                &self.closes,
                &self.volumes,
            );
        };

        let mut highs = self.highs.clone();
        let mut lows = self.lows.clone();
        let mut closes = self.closes.clone();
        let mut volumes = self.volumes.clone();
        highs.push(forming.high);
        lows.push(forming.low);
        closes.push(forming.close);
        volumes.push(forming.volume);
        compute(indicator, &self.opens, &highs, &lows, &closes, &volumes)
    }
}

fn compute(
    indicator: Indicator,
    _opens: &[f64],
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
) -> Option<IndicatorValue> {
    match indicator {
        Indicator::Sma { period } => calc::sma(closes, period).map(IndicatorValue::Scalar),
        Indicator::Ema { period } => calc::ema(closes, period).map(IndicatorValue::Scalar),
        Indicator::Rsi { period } => calc::rsi(closes, period).map(IndicatorValue::Scalar),
        Indicator::Atr { period } => {
            calc::atr(highs, lows, closes, period).map(IndicatorValue::Scalar)
        }
        Indicator::Bollinger { period, k } => calc::bollinger(closes, period, k.to_f64()?)
            .map(|(upper, middle, lower)| IndicatorValue::Bands { upper, middle, lower }),
        Indicator::Macd { fast, slow, signal } => calc::macd(closes, fast, slow, signal)
            .map(|(line, signal, histogram)| IndicatorValue::Macd { line, signal, histogram }),
        Indicator::Supertrend { period, multiplier } => {
            calc::supertrend(highs, lows, closes, period, multiplier.to_f64()?)
                .map(|(value, bullish)| IndicatorValue::Supertrend { value, bullish })
        }
        Indicator::VolumeSma { period } => calc::sma(volumes, period).map(IndicatorValue::Scalar),
    }
}
