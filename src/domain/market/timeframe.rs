use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle intervals supported by the aggregator. All are whole-minute
/// multiples up to one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    OneMin,
    ThreeMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    OneDay,
}

impl Timeframe {
    /// Duration of this timeframe in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::ThreeMin => 3,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::OneDay => 1440,
        }
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.minutes() * 60_000
    }

    /// Start timestamp (ms) of the period containing `timestamp_ms`:
    /// `⌊t / tf⌋ × tf`.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms - timestamp_ms.rem_euclid(self.duration_ms())
    }

    /// Whether `timestamp_ms` sits exactly on a period boundary.
    pub fn is_period_start(&self, timestamp_ms: i64) -> bool {
        timestamp_ms.rem_euclid(self.duration_ms()) == 0
    }

    /// All supported timeframes in ascending order.
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMin,
            Timeframe::ThreeMin,
            Timeframe::FiveMin,
            Timeframe::FifteenMin,
            Timeframe::ThirtyMin,
            Timeframe::OneHour,
            Timeframe::OneDay,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1min",
            Timeframe::ThreeMin => "3min",
            Timeframe::FiveMin => "5min",
            Timeframe::FifteenMin => "15min",
            Timeframe::ThirtyMin => "30min",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::OneMin),
            "3m" | "3min" => Ok(Timeframe::ThreeMin),
            "5m" | "5min" => Ok(Timeframe::FiveMin),
            "15m" | "15min" => Ok(Timeframe::FifteenMin),
            "30m" | "30min" => Ok(Timeframe::ThirtyMin),
            "1h" | "60min" => Ok(Timeframe::OneHour),
            "1d" | "1day" => Ok(Timeframe::OneDay),
            _ => Err(ConfigError::InvalidTimeframe(s.to_string())),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
