//! Error types for the learning-platform backend

use thiserror::Error;

/// Errors surfaced by [`crate::store::LearnStore`] implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// An identifier did not resolve to a record
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record looked up (quiz, module, section, ...)
        entity: &'static str,
        /// The identifier that failed to resolve
        id: String,
    },

    /// The backend rejected a read or write
    #[error("backend error ({status}): {message}")]
    Persistence {
        /// HTTP status code
        status: u16,
        /// Error body from the backend
        message: String,
    },

    /// A request exceeded its time budget
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// Configured per-request budget
        seconds: u64,
    },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// Response body did not match the expected shape
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same call is sensible.
    ///
    /// Timeouts, transport failures, and server-side (5xx / 429) rejections
    /// are transient; `NotFound` and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network(_) => true,
            Self::Persistence { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Json(_) => false,
        }
    }
}
