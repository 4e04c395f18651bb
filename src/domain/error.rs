//! Domain error types.
//!
//! Only configuration errors are fatal to a simulation run. Data-quality
//! problems inside the fold degrade to "undefined" values instead.

use chrono::{DateTime, Utc};

/// Top-level error type for anchortrader.
#[derive(Debug, thiserror::Error)]
pub enum AnchortraderError {
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

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data returned from {source_name}")]
    NoData { source_name: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("timestamp {timestamp} is not present in the minute series")]
    MisalignedTimestamp { timestamp: DateTime<Utc> },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnchortraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        AnchortraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        AnchortraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AnchortraderError::ConfigParse { .. }
                | AnchortraderError::ConfigMissing { .. }
                | AnchortraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&AnchortraderError> for std::process::ExitCode {
    fn from(err: &AnchortraderError) -> Self {
        let code: u8 = match err {
            AnchortraderError::Io(_) => 1,
            AnchortraderError::ConfigParse { .. }
            | AnchortraderError::ConfigMissing { .. }
            | AnchortraderError::ConfigInvalid { .. } => 2,
            AnchortraderError::DataSource { .. } => 3,
            AnchortraderError::NoData { .. }
            | AnchortraderError::InsufficientData { .. }
            | AnchortraderError::MisalignedTimestamp { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
