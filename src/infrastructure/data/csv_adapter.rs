use crate::domain::errors::DataError;
use crate::domain::market::{Candle, CandleState, Timeframe};
use crate::domain::ports::DataAdapter;
use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `DataAdapter` over a directory of per-day CSV files named
/// `<SYMBOL>_<YYYY-MM-DD>.csv` with the header
/// `timestamp,open,high,low,close,volume` (timestamp in market-local
/// milliseconds). Files hold 1-minute candles; higher timeframes are
/// aggregated on load.
pub struct CsvDataAdapter {
    data_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvDataAdapter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn day_file(&self, symbol: &str, date: NaiveDate) -> PathBuf {
        self.data_dir.join(format!("{symbol}_{date}.csv"))
    }

    fn read_day(&self, path: &Path, symbol: &str) -> Result<Vec<Candle>, DataError> {
        let mut reader = csv::Reader::from_path(path).map_err(DataError::Csv)?;
        let mut candles = Vec::new();
        for record in reader.deserialize() {
            let record: CandleRecord = record.map_err(DataError::Csv)?;
            candles.push(candle_from_record(symbol, &record)?);
        }
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn candle_from_record(symbol: &str, record: &CandleRecord) -> Result<Candle, DataError> {
    let to_decimal = |value: f64, field: &str| {
        Decimal::from_f64(value).ok_or_else(|| {
            DataError::MalformedCandle(format!("{symbol}@{}: bad {field} {value}", record.timestamp))
        })
    };
    let open = to_decimal(record.open, "open")?;
    let high = to_decimal(record.high, "high")?;
    let low = to_decimal(record.low, "low")?;
    let close = to_decimal(record.close, "close")?;

    if low > open.min(close) || high < open.max(close) || record.volume < 0.0 {
        return Err(DataError::MalformedCandle(format!(
            "{symbol}@{}: inconsistent OHLCV {} {} {} {} {}",
            record.timestamp, record.open, record.high, record.low, record.close, record.volume
        )));
    }

    Ok(Candle {
        symbol: symbol.to_string(),
        timeframe: Timeframe::OneMin,
        open,
        high,
        low,
        close,
        volume: record.volume,
        tick_count: 0,
        timestamp: record.timestamp,
        state: CandleState::Closed,
    })
}

/// Rolls 1-minute candles up into `timeframe` buckets by aligned period
/// start. Partial trailing buckets are kept; warmup treats them as closed
/// history.
fn aggregate(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    if timeframe == Timeframe::OneMin {
        return candles.to_vec();
    }
    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for candle in candles {
        let bucket_start = timeframe.period_start(candle.timestamp);
        buckets
            .entry(bucket_start)
            .and_modify(|agg| {
                agg.high = agg.high.max(candle.high);
                agg.low = agg.low.min(candle.low);
                agg.close = candle.close;
                agg.volume += candle.volume;
            })
            .or_insert_with(|| {
                let mut agg = candle.clone();
                agg.timestamp = bucket_start;
                agg.timeframe = timeframe;
                agg
            });
    }
    buckets.into_values().collect()
}

#[async_trait::async_trait]
impl DataAdapter for CsvDataAdapter {
    async fn list_symbols(&self) -> Result<Vec<String>> {
        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir).map_err(DataError::Io)? {
            let entry = entry.map_err(DataError::Io)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".csv")
                && let Some((symbol, _date)) = stem.rsplit_once('_')
            {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    async fn available_dates(&self, symbol: &str) -> Result<Vec<NaiveDate>> {
        let prefix = format!("{symbol}_");
        let mut dates = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir).map_err(DataError::Io)? {
            let entry = entry.map_err(DataError::Io)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".csv")
                && let Some(date_part) = stem.strip_prefix(&prefix)
                && let Ok(date) = date_part.parse::<NaiveDate>()
            {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    async fn load_day(&self, date: NaiveDate, symbol: &str) -> Result<Vec<Candle>> {
        let path = self.day_file(symbol, date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(self.read_day(&path, symbol)?)
    }

    async fn load_recent_closed(
        &self,
        date: NaiveDate,
        symbol: &str,
        n: usize,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>> {
        let mut collected: Vec<Candle> = Vec::new();
        let mut dates = self.available_dates(symbol).await?;
        dates.retain(|d| *d < date);

        // Walk backwards through prior sessions until enough candles at the
        // requested timeframe accumulate.
        for day in dates.iter().rev() {
            let day_candles = self.read_day(&self.day_file(symbol, *day), symbol)?;
            let mut aggregated = aggregate(&day_candles, timeframe);
            aggregated.extend(collected);
            collected = aggregated;
            if collected.len() >= n {
                break;
            }
        }

        let start = collected.len().saturating_sub(n);
        debug!(
            "CsvDataAdapter: {} {} candles of {} history before {}",
            collected.len() - start,
            timeframe,
            symbol,
            date
        );
        Ok(collected[start..].to_vec())
    }
}
