//! Error types for the action plugins

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// One or more required settings are absent (comma-separated key names)
    #[error("{0} not configured")]
    MissingSetting(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    ParameterExtraction(String),

    #[error("Tool invocation failed: {0}")]
    ToolInvocation(String),

    /// The call may have taken effect but its result was never observed
    #[error("Outcome unknown: {0}")]
    OutcomeUnknown(String),

    #[error("Blocked: {0}")]
    Blocked(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors raised while loading settings or binding tools.
    ///
    /// These are handled at the plugin-init boundary and never reach dispatch.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingSetting(_) | Error::InvalidSetting { .. } | Error::Config(_)
        )
    }

    /// Errors after which the side effect may still have happened
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, Error::OutcomeUnknown(_))
    }

    pub(crate) fn invalid_setting(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
