//! Custom error types for bua
//!
//! Provides a unified error handling system across all modules. Only failures
//! that end a run live here; per-action failures are folded into the transcript
//! as [`ExecutionOutcome::Failed`](crate::core::ExecutionOutcome).

use thiserror::Error;

/// Main error type for bua operations
#[derive(Error, Debug)]
pub enum BuaError {
    /// Decision service returned an error or an unusable response
    #[error("Decision service error: {0}")]
    Service(String),

    /// Decision service rejected our credentials
    #[error("Decision service rejected credentials: {0}")]
    Auth(String),

    /// Decision service could not be reached after all retries
    #[error("Decision service unavailable after {attempts} attempt(s): {message}")]
    ServiceUnavailable { attempts: u32, message: String },

    /// An operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The loop safeguard tripped before the task converged
    #[error("Iteration limit of {limit} exceeded before the task finished")]
    IterationLimitExceeded { limit: usize },

    /// The same safety check id was presented twice in one run
    #[error("Safety check '{0}' was presented more than once")]
    DuplicateSafetyCheck(String),

    /// A run was started without any input text
    #[error("Initial input must not be empty")]
    EmptyInput,

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for bua operations
pub type Result<T> = std::result::Result<T, BuaError>;

impl BuaError {
    /// Create a decision service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same service call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(_) | Self::Timeout(_) => true,
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map(|s| s.is_server_error() || s.as_u16() == 429).unwrap_or(false)
            }
            _ => false,
        }
    }
}
