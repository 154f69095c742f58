use crate::domain::errors::ConfigError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

fn default_warning() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 0, 0).unwrap_or_default()
}

fn default_square_off() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 15, 0).unwrap_or_default()
}

/// Time-of-day thresholds for the time controller, naive market-local times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// New entries are blocked from this time onward.
    pub warning: NaiveTime,
    /// All open positions are force-closed at this time.
    pub square_off: NaiveTime,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            warning: default_warning(),
            square_off: default_square_off(),
        }
    }
}

impl TimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.square_off <= self.warning {
            return Err(ConfigError::Invalid(format!(
                "time.square_off ({}) must be after time.warning ({})",
                self.square_off, self.warning
            )));
        }
        Ok(())
    }
}
