//! Huginn error types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed for provider {provider}")]
    AuthenticationFailed { provider: String },

    /// The provider answered, but the payload did not match the analysis schema.
    #[error("response failed schema validation: {0}")]
    Format(String),

    #[error("{provider}: gave up after {attempts} attempts: {last}")]
    ExhaustedRetries {
        provider: String,
        attempts: u32,
        last: Box<HuginnError>,
    },

    // Scheduling outcomes
    #[error("run budget exhausted")]
    BudgetExceeded,

    #[error("cancelled")]
    Cancelled,

    // Persistence errors
    #[error("cache file is corrupt: {0}")]
    CacheCorruption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Whether a retry of the same request might succeed.
    ///
    /// Timeouts, rate limits, transport failures, 5xx responses and schema
    /// validation failures are transient. Authentication failures never are.
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::Http(_)
            | HuginnError::RateLimited { .. }
            | HuginnError::Timeout(_)
            | HuginnError::Format(_) => true,
            HuginnError::Api { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// Provider-supplied hint for how long to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HuginnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether the next configuration in the fallback chain should be tried.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            HuginnError::AuthenticationFailed { .. } | HuginnError::ExhaustedRetries { .. }
        )
    }

    /// Coarse classification used in failure maps and run summaries.
    pub fn kind(&self) -> FailureKind {
        match self {
            HuginnError::AuthenticationFailed { .. } => FailureKind::Auth,
            HuginnError::ExhaustedRetries { .. } => FailureKind::ExhaustedRetries,
            HuginnError::BudgetExceeded => FailureKind::BudgetExceeded,
            HuginnError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }
}

/// Terminal outcome for a record that produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials rejected by every configuration that was tried.
    Auth,
    /// Retry budget spent without a valid response.
    ExhaustedRetries,
    /// Not attempted: the run budget would have been exceeded.
    BudgetExceeded,
    /// Not attempted or aborted because the caller cancelled the run.
    Cancelled,
    /// Any other permanent error (4xx responses, malformed requests).
    Other,
}

impl FailureKind {
    /// Whether the record was skipped by a scheduling decision rather than
    /// failing at the provider.
    pub fn is_skip(self) -> bool {
        matches!(self, FailureKind::BudgetExceeded | FailureKind::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Auth => "auth",
            FailureKind::ExhaustedRetries => "exhausted_retries",
            FailureKind::BudgetExceeded => "budget_exceeded",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
