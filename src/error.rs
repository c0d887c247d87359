//! Unified error types for Tabwarden

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Tabwarden
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed identifier or missing required parameter (caller error)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Page not found
    #[error("Page not found: {0}")]
    PageNotFound(String),

    /// Session creation rejected by the rate limiter
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Session creation rejected by the concurrency ceiling
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Dialog resolution requested with no dialog pending
    #[error("No pending dialog: {0}")]
    NoPendingDialog(String),

    /// Browser engine failed to launch a browser
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    /// Browser engine failed to close a browser or page
    #[error("Close failed: {0}")]
    CloseFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new session not found error
    pub fn session_not_found<S: Into<String>>(id: S) -> Self {
        Error::SessionNotFound(id.into())
    }

    /// Create a new page not found error
    pub fn page_not_found<S: Into<String>>(id: S) -> Self {
        Error::PageNotFound(id.into())
    }

    /// Create a new rate limit exceeded error
    pub fn rate_limit_exceeded<S: Into<String>>(msg: S) -> Self {
        Error::RateLimitExceeded(msg.into())
    }

    /// Create a new capacity exceeded error
    pub fn capacity_exceeded<S: Into<String>>(msg: S) -> Self {
        Error::CapacityExceeded(msg.into())
    }

    /// Create a new no pending dialog error
    pub fn no_pending_dialog<S: Into<String>>(msg: S) -> Self {
        Error::NoPendingDialog(msg.into())
    }

    /// Create a new launch failed error
    pub fn launch_failed<S: Into<String>>(msg: S) -> Self {
        Error::LaunchFailed(msg.into())
    }

    /// Create a new close failed error
    pub fn close_failed<S: Into<String>>(msg: S) -> Self {
        Error::CloseFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }
}
