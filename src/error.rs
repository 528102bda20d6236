//! Error types for Slidegate.

use thiserror::Error;

/// Main error type for Slidegate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Invalid policy or process configuration, raised at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed or disallowed caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The shared window store could not complete a check
    #[error("Window store unavailable: {0}")]
    StoreUnavailable(String),

    /// Verification codes were requested too often for this subject
    #[error("Verification code send rate limited")]
    SendRateLimited,

    /// Verification codes were checked too often for this subject
    #[error("Verification code check rate limited")]
    CheckRateLimited,

    /// SMS delivery errors
    #[error("SMS error: {0}")]
    Sms(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for GateError {
    fn from(err: redis::RedisError) -> Self {
        GateError::StoreUnavailable(err.to_string())
    }
}

impl GateError {
    /// Whether this error is one of the rate limited conditions.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GateError::SendRateLimited | GateError::CheckRateLimited)
    }
}

/// Result type alias for Slidegate operations.
pub type Result<T> = std::result::Result<T, GateError>;
