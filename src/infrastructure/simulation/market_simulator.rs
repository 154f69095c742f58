use crate::domain::market::{Candle, Tick};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Exponential smoothing factor along the intra-candle path.
const PATH_ALPHA: f64 = 0.3;
/// Gaussian jitter sigma as a fraction of price.
const JITTER_SIGMA: f64 = 0.0005;
/// Interior ticks are clamped this fraction of the range inside low/high.
const CLAMP_MARGIN: f64 = 0.001;
/// Share of candles that take the simple directional path.
const DIRECTIONAL_SHARE: f64 = 0.7;
/// Candles whose range exceeds this fraction of open always touch both
/// extremes.
const WIDE_RANGE_PCT: f64 = 0.02;

#[derive(Debug, Clone, Copy)]
pub struct SimulatorParams {
    pub seed: u64,
    pub ticks_per_candle: usize,
    /// Relative bid/ask spread.
    pub spread: f64,
    /// Playback multiplier; 0 means unthrottled.
    pub speed: u32,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self { seed: 1, ticks_per_candle: 10, spread: 0.001, speed: 0 }
    }
}

/// Replays one trading day of 1-minute OHLC as a deterministic intra-candle
/// tick sequence.
///
/// Every random draw comes from an `StdRng` seeded by a counter-based key
/// (seed, symbol, candle index, tick index, stream), so two runs with the
/// same inputs and seed produce bit-identical tick streams. Per-symbol
/// streams are merged by timestamp with ties broken by symbol order.
pub struct MarketSimulator {
    ticks: Vec<Tick>,
    cursor: usize,
    paused: bool,
    speed: u32,
}

impl MarketSimulator {
    pub fn new(params: SimulatorParams, day_candles: HashMap<String, Vec<Candle>>) -> Self {
        let mut ticks = Vec::new();
        for (symbol, candles) in &day_candles {
            for (candle_index, candle) in candles.iter().enumerate() {
                generate_candle_ticks(&params, symbol, candle_index, candle, &mut ticks);
            }
        }
        ticks.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        info!(
            "MarketSimulator: prepared {} ticks across {} symbols (seed {})",
            ticks.len(),
            day_candles.len(),
            params.seed
        );

        Self {
            ticks,
            cursor: 0,
            paused: false,
            speed: params.speed,
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.ticks.len() - self.cursor
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed.clamp(0, 1000);
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Next tick in merged chronological order.
    pub fn next_tick(&mut self) -> Option<Tick> {
        let tick = self.ticks.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(tick)
    }

    pub fn peek_timestamp(&self) -> Option<i64> {
        self.ticks.get(self.cursor).map(|t| t.timestamp)
    }

    /// Fast-forwards past every tick strictly before `timestamp_ms` without
    /// surfacing them. The caller must flush its aggregator afterwards so
    /// strategies never see a sparse half-formed candle. Returns how many
    /// ticks were skipped.
    pub fn jump_to(&mut self, timestamp_ms: i64) -> usize {
        let start = self.cursor;
        while self
            .ticks
            .get(self.cursor)
            .is_some_and(|t| t.timestamp < timestamp_ms)
        {
            self.cursor += 1;
        }
        self.cursor - start
    }

    /// Wall-clock delay before delivering a tick `sim_delta_ms` of simulated
    /// time after the previous one. `None` when unthrottled.
    pub fn inter_tick_delay(&self, sim_delta_ms: i64) -> Option<Duration> {
        if self.speed == 0 || sim_delta_ms <= 0 {
            return None;
        }
        Some(Duration::from_millis(sim_delta_ms as u64 / self.speed as u64))
    }

    /// Synchronous drain for tests and tools; the orchestrator pulls via
    /// `next_tick` instead so it can interleave its async pipeline.
    pub fn run<F: FnMut(&Tick)>(&mut self, mut callback: F) {
        while let Some(tick) = self.next_tick() {
            callback(&tick);
        }
    }
}

/// Counter-based derivation: one independent `StdRng` per
/// (seed, symbol, candle, tick, stream) key.
fn derive_rng(seed: u64, symbol: &str, candle_index: usize, tick_index: usize, stream: u64) -> StdRng {
    // FNV-1a over the symbol, then a splitmix-style scramble of the counters.
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol.as_bytes() {
        h ^= u64::from(*byte);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let mut key = seed
        .wrapping_add(h)
        .wrapping_add((candle_index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .wrapping_add((tick_index as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9))
        .wrapping_add(stream.wrapping_mul(0x94d0_49bb_1331_11eb));
    key ^= key >> 30;
    key = key.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    key ^= key >> 27;
    StdRng::seed_from_u64(key)
}

/// The four path waypoints for a candle, per its shape.
fn path_waypoints(candle: &Candle, use_extremes: bool) -> [f64; 4] {
    let open = candle.open.to_f64().unwrap_or_default();
    let high = candle.high.to_f64().unwrap_or_default();
    let low = candle.low.to_f64().unwrap_or_default();
    let close = candle.close.to_f64().unwrap_or_default();
    let bullish = close >= open;

    match (use_extremes, bullish) {
        (false, true) => [low, open, high, close],
        (false, false) => [high, open, low, close],
        (true, true) => [open, low, high, close],
        (true, false) => [open, high, low, close],
    }
}

fn generate_candle_ticks(
    params: &SimulatorParams,
    symbol: &str,
    candle_index: usize,
    candle: &Candle,
    out: &mut Vec<Tick>,
) {
    let n = params.ticks_per_candle.max(4);
    let open = candle.open.to_f64().unwrap_or_default();
    let high = candle.high.to_f64().unwrap_or_default();
    let low = candle.low.to_f64().unwrap_or_default();
    let range = (high - low).max(0.0);

    // Path selection: wide-range candles always touch both extremes; the
    // rest split 70/30 between directional and extremes-touching.
    let range_pct = if open > 0.0 { range / open } else { 0.0 };
    let use_extremes = if range_pct >= WIDE_RANGE_PCT {
        true
    } else {
        let mut path_rng = derive_rng(params.seed, symbol, candle_index, 0, 0);
        path_rng.random::<f64>() >= DIRECTIONAL_SHARE
    };
    let waypoints = path_waypoints(candle, use_extremes);

    let clamp_low = low + CLAMP_MARGIN * range;
    let clamp_high = high - CLAMP_MARGIN * range;
    let interval_ms = candle.timeframe.duration_ms() / n as i64;

    // Volume weights: path waypoints (and thus both endpoints) carry double
    // weight; the last tick absorbs rounding so the sum is exact.
    let waypoint_step = (n - 1) as f64 / 3.0;
    let is_waypoint = |i: usize| -> Option<usize> {
        let pos = i as f64 / waypoint_step;
        let nearest = pos.round();
        ((pos - nearest).abs() < 1e-9).then_some(nearest as usize)
    };
    let weights: Vec<f64> = (0..n)
        .map(|i| if is_waypoint(i).is_some() { 2.0 } else { 1.0 })
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    let mut prev_price = waypoints[0];
    let mut assigned_volume = 0.0;

    for i in 0..n {
        // Piecewise-linear target along the waypoint path.
        let pos = (i as f64 / (n - 1) as f64) * 3.0;
        let segment = (pos.floor() as usize).min(2);
        let frac = pos - segment as f64;
        let target = waypoints[segment] + (waypoints[segment + 1] - waypoints[segment]) * frac;

        let price = match is_waypoint(i) {
            // Waypoints are exact OHLC values, jitter-free.
            Some(w) => waypoints[w],
            None => {
                let smoothed = PATH_ALPHA * target + (1.0 - PATH_ALPHA) * prev_price;
                let mut tick_rng = derive_rng(params.seed, symbol, candle_index, i, 1);
                let sigma = JITTER_SIGMA * smoothed.abs().max(f64::MIN_POSITIVE);
                let jitter = Normal::new(0.0, sigma)
                    .map(|normal| normal.sample(&mut tick_rng))
                    .unwrap_or(0.0);
                if clamp_low < clamp_high {
                    (smoothed + jitter).clamp(clamp_low, clamp_high)
                } else {
                    // Degenerate flat candle.
                    smoothed
                }
            }
        };
        prev_price = price;

        let volume = if i == n - 1 {
            (candle.volume - assigned_volume).max(0.0)
        } else {
            let share = candle.volume * weights[i] / weight_sum;
            assigned_volume += share;
            share
        };

        let price_decimal = Decimal::from_f64(price)
            .unwrap_or(candle.close)
            .round_dp(4);
        let spread_decimal = Decimal::from_f64(params.spread).unwrap_or(Decimal::ZERO);
        out.push(Tick::from_mid(
            symbol,
            price_decimal,
            spread_decimal,
            volume,
            candle.timestamp + i as i64 * interval_ms,
            "simulator",
        ));
    }
}
