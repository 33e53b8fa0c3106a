//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for regimefolio.
#[derive(Debug, thiserror::Error)]
pub enum QuantError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("insufficient history for {symbol}: have {have} prices, need {need}")]
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("no price available for {symbol} on or before {date}")]
    MissingPriceData { symbol: String, date: NaiveDate },

    #[error("non-positive price for {symbol} on or before {date}")]
    InvalidPrice { symbol: String, date: NaiveDate },

    #[error("invalid price series for {symbol}: {reason}")]
    InvalidPriceSeries { symbol: String, reason: String },

    #[error("no universe scores available: {reason}")]
    NoUniverseScores { reason: String },

    #[error("unknown universe: {name}")]
    UnknownUniverse { name: String },

    #[error("no prior portfolio snapshot available")]
    NoPriorSnapshot,

    #[error("missing factor column for weight: {factor}")]
    MissingFactor { factor: String },

    #[error("portfolio weights for {as_of} must sum to 1.0 (got {total})")]
    InvalidPortfolio { as_of: NaiveDate, total: f64 },

    #[error("monthly performance series is empty")]
    EmptyPerformance,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&QuantError> for std::process::ExitCode {
    fn from(err: &QuantError) -> Self {
        let code: u8 = match err {
            QuantError::Io(_) => 1,
            QuantError::ConfigParse { .. }
            | QuantError::ConfigMissing { .. }
            | QuantError::ConfigInvalid { .. } => 2,
            QuantError::Database { .. } | QuantError::DatabaseQuery { .. } => 3,
            QuantError::InsufficientHistory { .. }
            | QuantError::MissingPriceData { .. }
            | QuantError::InvalidPrice { .. }
            | QuantError::InvalidPriceSeries { .. } => 5,
            QuantError::NoUniverseScores { .. }
            | QuantError::UnknownUniverse { .. }
            | QuantError::NoPriorSnapshot
            | QuantError::MissingFactor { .. }
            | QuantError::EmptyPerformance => 6,
            QuantError::InvalidPortfolio { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_message() {
        let err = QuantError::InsufficientHistory {
            symbol: "QQQ".into(),
            have: 100,
            need: 253,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history for QQQ: have 100 prices, need 253"
        );
    }

    #[test]
    fn missing_price_message_includes_date() {
        let err = QuantError::MissingPriceData {
            symbol: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "no price available for AAPL on or before 2024-01-31"
        );
    }

    #[test]
    fn invalid_portfolio_reports_total() {
        let err = QuantError::InvalidPortfolio {
            as_of: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            total: 0.9,
        };
        assert_eq!(
            err.to_string(),
            "portfolio weights for 2024-02-29 must sum to 1.0 (got 0.9)"
        );
    }
}
