//! Error types for Pennywise
//!
//! The first five variants form the pipeline taxonomy that callers see.
//! The rest are plumbing errors; orchestrators fold them into the taxonomy
//! with [`Error::into_pipeline`] before returning.

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::MANUAL_ENTRY_FALLBACK;

#[derive(Error, Debug)]
pub enum Error {
    /// Required setting (usually the API key) is missing or unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model call itself failed (network, auth, quota, safety block, timeout)
    #[error("Model call failed: {0}")]
    Invocation(String),

    /// Model output was not valid structured data after fence stripping
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// Parsed data violated a field contract
    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Not enough history to run an analysis
    #[error("Insufficient data: {found} expense records, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Invocation(_) | Error::Http(_) => ErrorKind::Invocation,
            Error::MalformedOutput(_) | Error::Json(_) => ErrorKind::MalformedOutput,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::InsufficientData { .. } => ErrorKind::InsufficientData,
            Error::Io(_) | Error::InvalidData(_) => ErrorKind::Invocation,
        }
    }

    /// Fold plumbing variants into taxonomy variants.
    ///
    /// Taxonomy variants pass through untouched.
    pub fn into_pipeline(self) -> Self {
        match self {
            Error::Http(e) => {
                if e.is_timeout() {
                    Error::Invocation(format!("request timed out: {}", e))
                } else {
                    Error::Invocation(e.to_string())
                }
            }
            Error::Json(e) => Error::MalformedOutput(e.to_string()),
            Error::Io(e) => Error::Invocation(e.to_string()),
            Error::InvalidData(msg) => Error::Invocation(msg),
            other => other,
        }
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Error::InsufficientData { found, required } => format!(
                "Add at least {} expenses to get a financial health analysis ({} recorded so far).",
                required, found
            ),
            Error::Configuration(_) => {
                "AI features are not configured on this server.".to_string()
            }
            _ => "We could not complete the request. Please try again.".to_string(),
        }
    }

    /// User-facing message worded for the pipeline that failed.
    ///
    /// Every extraction failure ends with the manual-entry fallback.
    pub fn user_message_in(&self, pipeline: Pipeline) -> String {
        match (pipeline, self) {
            (Pipeline::Extraction, Error::Configuration(_)) => format!(
                "{} You can still enter the expense manually.",
                self.user_message()
            ),
            (Pipeline::Extraction, _) => MANUAL_ENTRY_FALLBACK.to_string(),
            (Pipeline::Analysis, Error::InsufficientData { .. } | Error::Configuration(_)) => {
                self.user_message()
            }
            (Pipeline::Analysis, _) => {
                "We could not complete your financial health analysis. Please try again."
                    .to_string()
            }
        }
    }
}

/// The pipeline an error came out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Extraction,
    Analysis,
}

/// Caller-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Invocation,
    MalformedOutput,
    Validation,
    InsufficientData,
}

impl ErrorKind {
    /// Stable identifier used in API responses and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Invocation => "invocation",
            Self::MalformedOutput => "malformed_output",
            Self::Validation => "validation",
            Self::InsufficientData => "insufficient_data",
        }
    }

    /// Whether the UI should offer a retry action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Invocation | Self::MalformedOutput | Self::Validation
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::Configuration("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::Invocation("x".into()).kind(), ErrorKind::Invocation);
        assert_eq!(
            Error::MalformedOutput("x".into()).kind(),
            ErrorKind::MalformedOutput
        );
        assert_eq!(
            Error::validation("healthScore", "out of range").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::InsufficientData {
                found: 2,
                required: 5
            }
            .kind(),
            ErrorKind::InsufficientData
        );
    }

    #[test]
    fn test_retry_affordance() {
        assert!(ErrorKind::Invocation.is_retryable());
        assert!(ErrorKind::MalformedOutput.is_retryable());
        assert!(!ErrorKind::InsufficientData.is_retryable());
        assert!(!ErrorKind::Configuration.is_retryable());
    }

    #[test]
    fn test_into_pipeline_folds_json_errors() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let folded = Error::from(json_err).into_pipeline();
        assert!(matches!(folded, Error::MalformedOutput(_)));

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(matches!(io.into_pipeline(), Error::Invocation(_)));
    }

    #[test]
    fn test_into_pipeline_keeps_taxonomy() {
        let err = Error::validation("category", "not in list").into_pipeline();
        match err {
            Error::Validation { field, .. } => assert_eq!(field, "category"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_user_message_insufficient_data() {
        let msg = Error::InsufficientData {
            found: 3,
            required: 5,
        }
        .user_message();
        assert!(msg.contains("at least 5"));
        assert!(msg.contains("3 recorded"));
    }

    #[test]
    fn test_extraction_messages_offer_manual_entry() {
        for err in [
            Error::Invocation("quota exceeded".into()),
            Error::MalformedOutput("Sorry, I cannot process this image.".into()),
            Error::validation("amount", "is negative"),
            Error::Configuration("GEMINI_API_KEY is not set".into()),
        ] {
            let msg = err.user_message_in(Pipeline::Extraction);
            assert!(msg.contains("manually"), "{:?} -> {}", err, msg);
            assert!(!msg.contains("Sorry"));
        }
    }

    #[test]
    fn test_analysis_messages() {
        let msg = Error::Invocation("timeout".into()).user_message_in(Pipeline::Analysis);
        assert!(msg.contains("analysis"));
        assert!(!msg.contains("manually"));

        let msg = Error::InsufficientData {
            found: 1,
            required: 5,
        }
        .user_message_in(Pipeline::Analysis);
        assert!(msg.contains("at least 5"));
    }
}
