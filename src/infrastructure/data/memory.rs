use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::DataAdapter;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

/// `DataAdapter` backed by maps, for tests and programmatic runs.
///
/// Day candles are keyed by (date, symbol); warmup history is keyed by
/// (symbol, timeframe) and `load_recent_closed` returns its tail regardless
/// of the requested date, which is what a warmup caller needs.
pub struct InMemoryDataAdapter {
    days: Mutex<HashMap<(NaiveDate, String), Vec<Candle>>>,
    history: Mutex<HashMap<(String, Timeframe), Vec<Candle>>>,
}

impl InMemoryDataAdapter {
    pub fn new() -> Self {
        Self {
            days: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_day(self, date: NaiveDate, symbol: &str, candles: Vec<Candle>) -> Self {
        if let Ok(mut days) = self.days.lock() {
            days.insert((date, symbol.to_string()), candles);
        }
        self
    }

    pub fn with_history(self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        if let Ok(mut history) = self.history.lock() {
            history.insert((symbol.to_string(), timeframe), candles);
        }
        self
    }
}

impl Default for InMemoryDataAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DataAdapter for InMemoryDataAdapter {
    async fn list_symbols(&self) -> Result<Vec<String>> {
        let days = self.days.lock().map_err(|_| anyhow::anyhow!("adapter lock poisoned"))?;
        let mut symbols: Vec<String> = days.keys().map(|(_, s)| s.clone()).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    async fn available_dates(&self, symbol: &str) -> Result<Vec<NaiveDate>> {
        let days = self.days.lock().map_err(|_| anyhow::anyhow!("adapter lock poisoned"))?;
        let mut dates: Vec<NaiveDate> = days
            .keys()
            .filter(|(_, s)| s == symbol)
            .map(|(d, _)| *d)
            .collect();
        dates.sort();
        Ok(dates)
    }

    async fn load_day(&self, date: NaiveDate, symbol: &str) -> Result<Vec<Candle>> {
        let days = self.days.lock().map_err(|_| anyhow::anyhow!("adapter lock poisoned"))?;
        Ok(days
            .get(&(date, symbol.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn load_recent_closed(
        &self,
        _date: NaiveDate,
        symbol: &str,
        n: usize,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>> {
        let history = self.history.lock().map_err(|_| anyhow::anyhow!("adapter lock poisoned"))?;
        let candles = history
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        let start = candles.len().saturating_sub(n);
        Ok(candles[start..].to_vec())
    }
}
