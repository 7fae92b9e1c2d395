//! Error types for solace.
//!
//! Taxonomy:
//! - Expected failures: bad input, bad config, corrupt checkpoint log
//! - Infrastructure failures: network, timeout, provider errors
//! - Invariant violations: bugs
//!
//! Every error reaching the batch driver is classified into a
//! [`Disposition`]: skip the record, or abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Provider error codes that mark a content-policy rejection.
const CONTENT_POLICY_CODES: &[&str] = &[
    "data_inspection_failed",
    "content_filter",
    "content_policy_violation",
];

/// Top-level error type for solace.
#[derive(Debug, Error)]
pub enum SolaceError {
    // ═══════════════════════════════════════════════════════════════════
    // EXPECTED FAILURES
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid dataset {path}: {source}")]
    Dataset {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupt output log {path} at line {line}: {source}")]
    CorruptLog {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // INFRASTRUCTURE FAILURES
    // ═══════════════════════════════════════════════════════════════════

    #[error("Completion API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Malformed streaming response: {0}")]
    MalformedStream(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // INVARIANT VIOLATIONS
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Structured error reported by the completion endpoint.
///
/// `status` is the HTTP status of the response; errors delivered inside an
/// already-open stream carry the 200 of that stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("status {status}{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub error_type: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            error_type: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the provider rejected the request content itself.
    pub fn is_content_policy(&self) -> bool {
        if self.status == 400 {
            return true;
        }
        [self.code.as_deref(), self.error_type.as_deref()]
            .into_iter()
            .flatten()
            .any(|c| CONTENT_POLICY_CODES.contains(&c))
    }
}

/// What the batch driver does with a failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Log, leave the record unprocessed, continue with the next one
    Skip,
    /// Log and stop the batch
    Abort,
}

impl SolaceError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error for the batch driver.
    ///
    /// Only content-policy rejections are skippable.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Api(api) if api.is_content_policy() => Disposition::Skip,
            _ => Disposition::Abort,
        }
    }

    pub fn is_skippable(&self) -> bool {
        self.disposition() == Disposition::Skip
    }
}

/// Result type alias for solace.
pub type Result<T> = std::result::Result<T, SolaceError>;
