use crate::config::TimeConfig;
use chrono::{DateTime, NaiveTime};
use tracing::info;

/// Events fired when the simulated clock crosses the configured boundaries.
/// Each fires at most once per day; replays of the same timestamp are
/// idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEvent {
    /// Block new entries from here on.
    Warning,
    /// Force-close every open position.
    SquareOff,
}

/// Holds a "simulated now" advanced by every tick and compares its
/// time-of-day against the configured market-local thresholds.
pub struct TimeController {
    config: TimeConfig,
    now_ms: i64,
    warned: bool,
    squared_off: bool,
}

impl TimeController {
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            now_ms: 0,
            warned: false,
            squared_off: false,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn is_warned(&self) -> bool {
        self.warned
    }

    pub fn is_squared_off(&self) -> bool {
        self.squared_off
    }

    /// Advances the simulated clock and returns newly crossed events, in
    /// firing order.
    pub fn advance(&mut self, timestamp_ms: i64) -> Vec<TimeEvent> {
        self.now_ms = self.now_ms.max(timestamp_ms);
        let Some(time_of_day) = time_of_day(self.now_ms) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if !self.warned && time_of_day >= self.config.warning {
            self.warned = true;
            info!("TimeController: {} warning reached, blocking new entries", self.config.warning);
            events.push(TimeEvent::Warning);
        }
        if !self.squared_off && time_of_day >= self.config.square_off {
            self.squared_off = true;
            info!("TimeController: {} square-off reached", self.config.square_off);
            events.push(TimeEvent::SquareOff);
        }
        events
    }

    /// Day-boundary reset for multi-day runs.
    pub fn reset_daily(&mut self) {
        self.warned = false;
        self.squared_off = false;
    }
}

/// Timestamps are market-local wall-clock milliseconds, so the UTC reading
/// of the timestamp IS the local time of day.
fn time_of_day(timestamp_ms: i64) -> Option<NaiveTime> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.naive_utc().time())
}
