//! Error handling module
//!
//! One taxonomy for every fault a request can hit. Callers only ever see
//! [`LeadError::user_message`]; the `Display` form carries the detail that
//! goes to the server log.

use thiserror::Error;

/// Generic text returned for every fault that is not the caller's doing.
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

#[derive(Clone, Debug, Error)]
pub enum LeadError {
    /// A required environment value is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store could not be reached.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A store read or write failed after the connection was established.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error("rate limit exceeded")]
    RateLimited { message: &'static str },
}

impl LeadError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn connectivity(err: impl std::fmt::Display) -> Self {
        Self::Connectivity(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::RateLimited { .. } => 429,
            Self::Configuration(_) | Self::Connectivity(_) | Self::Storage(_) => 500,
        }
    }

    /// Message safe to hand back to the caller
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(message) => message,
            Self::RateLimited { message } => message,
            Self::Configuration(_) | Self::Connectivity(_) | Self::Storage(_) => {
                SERVER_ERROR_MESSAGE
            }
        }
    }

    /// Whether the fault is an incident worth an `error` log line. Caller
    /// mistakes and throttling are not.
    pub fn is_incident(&self) -> bool {
        self.http_status() >= 500
    }
}

pub type LeadResult<T> = Result<T, LeadError>;
