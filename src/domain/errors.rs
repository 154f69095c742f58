use thiserror::Error;

/// Fatal at startup. The process exits with code 2.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown strategy class: '{0}'")]
    UnknownStrategyClass(String),

    #[error("invalid timeframe: '{0}'")]
    InvalidTimeframe(String),

    #[error("strategy '{strategy}': missing required parameter '{parameter}'")]
    MissingParameter { strategy: String, parameter: String },

    #[error("strategy '{strategy}': invalid parameters: {message}")]
    InvalidParameters { strategy: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Data problems. Warmup degrades gracefully; a live day with zero candles
/// aborts the run with exit code 3.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("no candles for {symbol} on {date}")]
    NoData { symbol: String, date: chrono::NaiveDate },

    #[error("malformed candle record: {0}")]
    MalformedCandle(String),

    #[error("data io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker not connected")]
    NotConnected,

    #[error("order rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnknownStrategyClass("momo".to_string());
        assert_eq!(err.to_string(), "unknown strategy class: 'momo'");

        let err = ConfigError::MissingParameter {
            strategy: "rsi_momentum".to_string(),
            parameter: "rsi_period".to_string(),
        };
        assert!(err.to_string().contains("rsi_period"));
    }

    #[test]
    fn test_data_error_display() {
        let err = DataError::NoData {
            symbol: "TCS".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        assert!(err.to_string().contains("TCS"));
        assert!(err.to_string().contains("2024-01-15"));
    }
}
