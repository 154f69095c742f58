use crate::domain::market::{Candle, Tick, Timeframe};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

const DEFAULT_RING_CAPACITY: usize = 500;

/// Turns the tick stream into forming and closed candles for every configured
/// timeframe.
///
/// One forming candle is kept per (symbol, timeframe). A tick at or past the
/// forming candle's boundary closes it, appends it to the bounded
/// closed-candle ring and starts a new forming candle from that tick. Gaps
/// are not backfilled: after a quiet stretch the next tick simply opens a
/// candle at its own aligned boundary.
pub struct CandleAggregator {
    timeframes: Vec<Timeframe>,
    forming: HashMap<(String, Timeframe), Candle>,
    closed: HashMap<(String, Timeframe), VecDeque<Candle>>,
    ring_capacity: usize,
}

impl CandleAggregator {
    pub fn new(timeframes: Vec<Timeframe>) -> Self {
        Self {
            timeframes,
            forming: HashMap::new(),
            closed: HashMap::new(),
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity.max(1);
        self
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Feeds one tick. Returns the candles this tick closed, in configured
    /// timeframe order; the caller dispatches them onward before the tick
    /// itself.
    pub fn process_tick(&mut self, tick: &Tick) -> Vec<Candle> {
        let mut closed_now = Vec::new();

        let timeframes = self.timeframes.clone();
        for timeframe in timeframes {
            let key = (tick.symbol.clone(), timeframe);
            let rolls = self
                .forming
                .get(&key)
                .map(|candle| candle.is_past_boundary(tick.timestamp));

            match rolls {
                Some(false) => {
                    if let Some(candle) = self.forming.get_mut(&key) {
                        candle.apply_tick(tick);
                    }
                }
                Some(true) => {
                    if let Some(mut done) = self
                        .forming
                        .insert(key, Candle::open_from_tick(tick, timeframe))
                    {
                        done.finalize();
                        debug!(
                            "CandleAggregator: closed {} {} candle at {} (ticks: {})",
                            done.symbol, timeframe, done.timestamp, done.tick_count
                        );
                        self.push_closed(done.clone());
                        closed_now.push(done);
                    }
                }
                None => {
                    self.forming
                        .insert(key, Candle::open_from_tick(tick, timeframe));
                }
            }
        }

        closed_now
    }

    /// Warmup path: appends a pre-built closed candle to the ring. The caller
    /// dispatches the returned reference through the same candle-closed
    /// routing as live candles, so indicators see an identical path.
    pub fn add_historical_candle(&mut self, candle: Candle) -> Candle {
        debug_assert!(candle.is_closed());
        self.push_closed(candle.clone());
        candle
    }

    pub fn get_forming(&self, symbol: &str, timeframe: Timeframe) -> Option<&Candle> {
        self.forming.get(&(symbol.to_string(), timeframe))
    }

    /// Last `n` closed candles, oldest first.
    pub fn get_closed(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        match self.closed.get(&(symbol.to_string(), timeframe)) {
            Some(ring) => {
                let start = ring.len().saturating_sub(n);
                ring.iter().skip(start).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Finalizes every outstanding forming candle, e.g. at end of simulation
    /// or after a jump. Returned in (symbol, timeframe) order for a stable
    /// dispatch sequence.
    pub fn flush(&mut self) -> Vec<Candle> {
        let mut keys: Vec<_> = self.forming.keys().cloned().collect();
        keys.sort();

        let mut flushed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(mut candle) = self.forming.remove(&key) {
                candle.finalize();
                self.push_closed(candle.clone());
                flushed.push(candle);
            }
        }
        flushed
    }

    fn push_closed(&mut self, candle: Candle) {
        let ring = self
            .closed
            .entry((candle.symbol.clone(), candle.timeframe))
            .or_default();
        ring.push_back(candle);
        if ring.len() > self.ring_capacity {
            ring.pop_front();
        }
    }
}
