//! # Error Types Module
//!
//! Classified errors that cross module boundaries and end up in front of
//! users or operators. Persistence and wiring code uses `anyhow` instead.

use thiserror::Error;

/// Failure while turning free text into structured activities.
///
/// The `Display` output is shown to the user verbatim after a failed
/// registration, so every variant carries a readable cause.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    /// Transport-level failure reaching the model endpoint
    #[error("error calling the language model: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status
    #[error("language model returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The model answered without any text
    #[error("the language model returned an empty response")]
    EmptyResponse,

    /// The response text could not be parsed as JSON
    #[error("invalid JSON from the language model: {0}")]
    InvalidJson(String),

    /// The JSON did not match the activity schema
    #[error("response validation failed: {0}")]
    Validation(String),

    /// The client was built with unusable settings
    #[error("extraction client misconfigured: {0}")]
    Configuration(String),
}

impl ExtractionError {
    /// Whether a fresh model invocation could plausibly succeed.
    ///
    /// Model output varies between calls, so unparseable or invalid output
    /// is worth another attempt. Only a misconfigured client is final.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ExtractionError::Configuration(_))
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        ExtractionError::Request(err.to_string())
    }
}

/// Invalid or missing process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ExtractionError::Request("timeout".into()).is_transient());
        assert!(ExtractionError::EmptyResponse.is_transient());
        assert!(ExtractionError::Api { status: 503, message: "busy".into() }.is_transient());
        assert!(ExtractionError::InvalidJson("eof".into()).is_transient());
        assert!(ExtractionError::Validation("empty list".into()).is_transient());
        assert!(!ExtractionError::Configuration("empty API key".into()).is_transient());
    }

    #[test]
    fn test_display_carries_cause() {
        let err = ExtractionError::Validation("hours out of range".into());
        assert!(err.to_string().contains("hours out of range"));

        let err = ConfigError::Invalid { key: "TIMEZONE", reason: "unknown zone".into() };
        assert_eq!(err.to_string(), "invalid value for TIMEZONE: unknown zone");
    }
}
