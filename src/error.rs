//! Error types for the portal worker
//!
//! Uses thiserror for ergonomic error definitions.
//! Every variant maps onto an HTTP status so route handlers can answer
//! with a JSON error body without matching on the error themselves.

use thiserror::Error;

/// Custom Result type using our Error
pub type Result<T> = std::result::Result<T, PortalError>;

/// Portal errors
#[derive(Error, Debug)]
pub enum PortalError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Email/password pair did not match a stored account
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, unknown or expired session token
    #[error("Not logged in")]
    Unauthenticated,

    /// Caller is logged in but lacks the required status
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Account not found
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Operation refused for the target record
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Gemini API errors
    #[error("AI API error: {0}")]
    AiApi(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: retry after {0} seconds")]
    RateLimit(u64),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Worker runtime errors
    #[error("Worker error: {0}")]
    Worker(String),
}

impl PortalError {
    /// HTTP status code reported to the client for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PortalError::Validation(_) | PortalError::Json(_) => 400,
            PortalError::InvalidCredentials | PortalError::Unauthenticated => 401,
            PortalError::Forbidden(_) => 403,
            PortalError::NotFound(_) => 404,
            PortalError::Rejected(_) => 409,
            PortalError::RateLimit(_) => 429,
            PortalError::AiApi(_) | PortalError::Http(_) => 502,
            PortalError::Config(_) | PortalError::Storage(_) | PortalError::Worker(_) => 500,
        }
    }
}

impl From<worker::Error> for PortalError {
    fn from(err: worker::Error) -> Self {
        PortalError::Worker(err.to_string())
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        PortalError::Http(err.to_string())
    }
}

impl From<PortalError> for worker::Error {
    fn from(err: PortalError) -> Self {
        worker::Error::RustError(err.to_string())
    }
}
