use meteora_core::{AppError, NetworkError};
use meteora_offline::FetchError;

/// Gateway failures, classified so callers can choose retry vs. give-up.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Request timed out")]
    Timeout,

    #[error("No internet connection")]
    Offline,

    /// Non-success status; `status` is 0 when the failure had no HTTP origin
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    Parse(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    /// Timeouts, lost connectivity and 5xx/429 responses are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Offline => true,
            GatewayError::Http { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Parse(_) | GatewayError::InvalidUrl(_) => false,
        }
    }
}

impl From<FetchError> for GatewayError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Timeout => GatewayError::Timeout,
            FetchError::Network(_) => GatewayError::Offline,
            FetchError::InvalidRequest(message) => GatewayError::Http { status: 0, message },
        }
    }
}

impl From<GatewayError> for NetworkError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout => NetworkError::Timeout,
            GatewayError::Offline => NetworkError::Offline,
            GatewayError::Http { status, message } => NetworkError::HttpFailure { status, message },
            GatewayError::Parse(msg) => NetworkError::ParseFailure(msg),
            GatewayError::InvalidUrl(e) => NetworkError::HttpFailure {
                status: 0,
                message: e.to_string(),
            },
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::Network(e.into())
    }
}
