//! Domain error types.

/// Top-level error type for candlebot.
#[derive(Debug, thiserror::Error)]
pub enum CandlebotError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("symbol {symbol} missing from frame at {timestamp}")]
    MissingSymbol { symbol: String, timestamp: i64 },

    #[error("unsupported timeframe: {minutes} minutes")]
    UnsupportedTimeframe { minutes: u32 },

    #[error("invalid history selection: {reason}")]
    HistorySelection { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to parse dataset file {file}: {reason}")]
    DatasetParse { file: String, reason: String },

    #[error("exchange error {code}: {msg}")]
    Exchange { code: i64, msg: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CandlebotError {
    pub fn data(reason: impl Into<String>) -> Self {
        CandlebotError::Data {
            reason: reason.into(),
        }
    }

    /// Errors raised while resolving configuration, before any I/O happens.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CandlebotError::UnsupportedTimeframe { .. }
                | CandlebotError::HistorySelection { .. }
                | CandlebotError::ConfigParse { .. }
                | CandlebotError::ConfigMissing { .. }
                | CandlebotError::ConfigInvalid { .. }
        )
    }
}

impl From<&CandlebotError> for std::process::ExitCode {
    fn from(err: &CandlebotError) -> Self {
        let code: u8 = match err {
            CandlebotError::Io(_) => 1,
            CandlebotError::UnsupportedTimeframe { .. }
            | CandlebotError::HistorySelection { .. }
            | CandlebotError::ConfigParse { .. }
            | CandlebotError::ConfigMissing { .. }
            | CandlebotError::ConfigInvalid { .. } => 2,
            CandlebotError::Exchange { .. } | CandlebotError::Http(_) => 3,
            CandlebotError::DatasetParse { .. }
            | CandlebotError::Csv(_)
            | CandlebotError::Json(_) => 4,
            CandlebotError::Data { .. } | CandlebotError::MissingSymbol { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_classified() {
        assert!(CandlebotError::UnsupportedTimeframe { minutes: 7 }.is_config_error());
        assert!(
            CandlebotError::HistorySelection {
                reason: "neither".into()
            }
            .is_config_error()
        );
        assert!(!CandlebotError::data("short").is_config_error());
    }

    #[test]
    fn display_messages() {
        let err = CandlebotError::MissingSymbol {
            symbol: "BTC/USDT".into(),
            timestamp: 60,
        };
        assert_eq!(err.to_string(), "symbol BTC/USDT missing from frame at 60");

        let err = CandlebotError::Exchange {
            code: -1121,
            msg: "Invalid symbol.".into(),
        };
        assert_eq!(err.to_string(), "exchange error -1121: Invalid symbol.");
    }
}
