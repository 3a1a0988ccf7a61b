//! Error types for remote gateway calls.

/// Errors from talking to the document service.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("unauthorized")]
    Unauthorized,
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Classify a transport-level `reqwest` failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if err.is_builder() {
            GatewayError::InvalidRequest(err.to_string())
        } else {
            GatewayError::Connection(err.to_string())
        }
    }
}

/// A specialized `Result` type for gateway calls.
pub type Result<T> = std::result::Result<T, GatewayError>;
