use solsync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Solution not configured: {0}")]
    Configuration(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Rate limited: {retry_after:?}")]
    RateLimit { retry_after: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(e) => !e.is_builder(),
            ApiError::Server { status, .. } if *status >= 500 => true,
            ApiError::RateLimit { .. } => true,
            _ => false,
        }
    }

    /// HTTP status behind this error, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimit { .. } => Some(429),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Configuration(message) => SyncError::Configuration(message),
            ApiError::Server { status, message } => SyncError::Remote { status, body: message },
            other => SyncError::Remote {
                status: other.status().unwrap_or(0),
                body: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
