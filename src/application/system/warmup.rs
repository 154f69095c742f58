use crate::application::market_data::CandleAggregator;
use crate::application::risk_management::TrailingStopManager;
use crate::application::strategies::MultiStrategyManager;
use crate::config::WarmupConfig;
use crate::domain::ports::DataAdapter;
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// What warmup actually managed to load, for the startup log and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupReport {
    /// Candle count requested per (symbol, timeframe).
    pub required: usize,
    pub candles_loaded: usize,
    /// True when any (symbol, timeframe) had less history than requested.
    pub degraded: bool,
}

/// Bootstraps indicator state from historical candles so the first live tick
/// sees fully initialized strategies. Runs synchronously before the live
/// loop; no strategy may emit a signal until it completes.
pub struct WarmupManager {
    config: WarmupConfig,
}

impl WarmupManager {
    pub fn new(config: WarmupConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        adapter: &Arc<dyn DataAdapter>,
        date: NaiveDate,
        symbols: &[String],
        aggregator: &mut CandleAggregator,
        strategies: &mut MultiStrategyManager,
        trailing: &mut TrailingStopManager,
    ) -> Result<WarmupReport> {
        let mut required = strategies.max_warmup_candles();
        if self.config.auto_calculate && self.config.min_candles > required {
            required = self.config.min_candles;
        }
        let timeframes = strategies.required_timeframes();
        info!(
            "WarmupManager: loading {} candles per (symbol, timeframe) across {:?}",
            required, timeframes
        );

        let mut candles_loaded = 0usize;
        let mut degraded = false;
        let total_slots = symbols.len() * timeframes.len();
        let mut done_slots = 0usize;

        for symbol in symbols {
            for &timeframe in &timeframes {
                let history = match adapter
                    .load_recent_closed(date, symbol, required, timeframe)
                    .await
                {
                    Ok(history) => history,
                    Err(e) => {
                        warn!(
                            "WarmupManager: history load failed for {} {}: {e}. Proceeding \
                             degraded; indicators fill from live candles",
                            symbol, timeframe
                        );
                        degraded = true;
                        continue;
                    }
                };

                if history.len() < required {
                    degraded = true;
                    warn!(
                        "WarmupManager: only {}/{} candles for {} {}",
                        history.len(),
                        required,
                        symbol,
                        timeframe
                    );
                }

                // Chronological replay through the aggregator's normal path,
                // so indicators see exactly what live trading would produce.
                for candle in history {
                    let dispatched = aggregator.add_historical_candle(candle);
                    strategies.dispatch_warmup_candle(&dispatched);
                    trailing.on_candle_closed(&dispatched);
                    candles_loaded += 1;
                }

                done_slots += 1;
                if total_slots > 0 && done_slots.is_multiple_of(total_slots.div_ceil(4).max(1)) {
                    info!(
                        "WarmupManager: progress {}%",
                        done_slots * 100 / total_slots
                    );
                }
            }
        }

        if candles_loaded == 0 {
            warn!(
                "WarmupManager: no historical candles at all; strategies go live cold and \
                 indicator readiness will gate signals"
            );
            degraded = true;
        }

        strategies.set_all_warmed_up();
        info!(
            "WarmupManager: complete, {} candles loaded{}",
            candles_loaded,
            if degraded { " (degraded)" } else { "" }
        );

        Ok(WarmupReport { required, candles_loaded, degraded })
    }
}
