//! Centralized error types for the Meteora dashboard.
//!
//! This module provides a typed error hierarchy that:
//! - Classifies failures so callers can choose retry vs. give-up
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Gateway, geolocation and storage errors all convert into this type.
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Persistence(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Location(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "Something went wrong. Please refresh and try again.",
        }
    }

    /// True for failures that may succeed if the same request is repeated later.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Network(e) => e.is_transient(),
            AppError::Location(LocationError::Timeout) => true,
            _ => false,
        }
    }
}

/// Network-related errors (HTTP, connectivity, payload shape).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Request timed out")]
    Timeout,

    #[error("No internet connection")]
    Offline,

    #[error("HTTP {status}: {message}")]
    HttpFailure { status: u16, message: String },

    #[error("Invalid response: {0}")]
    ParseFailure(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::Timeout => "Request timed out. Please check your connection.",
            NetworkError::Offline => "No internet connection. Please check your network.",
            NetworkError::HttpFailure { status, .. } if *status >= 500 => {
                "The weather service is having issues. Please try again later."
            }
            NetworkError::HttpFailure { .. } => "The request failed. Please try again.",
            NetworkError::ParseFailure(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::Offline => true,
            NetworkError::HttpFailure { status, .. } => *status >= 500 || *status == 429,
            NetworkError::ParseFailure(_) => false,
        }
    }
}

/// Durable storage errors (persisted state record, cache snapshots).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PersistenceError::Unavailable(_) => {
                "Settings could not be loaded. Using defaults."
            }
            PersistenceError::WriteFailed(_) => {
                "Settings could not be saved. Changes apply to this session only."
            }
            PersistenceError::Corrupt(_) => "Saved settings were unreadable and were reset.",
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                PersistenceError::Unavailable(e.to_string())
            }
            _ => PersistenceError::WriteFailed(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Corrupt(e.to_string())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Geolocation errors
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service unavailable")]
    ServiceUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location error: {0}")]
    Other(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location access denied. Please enable location permissions and try again."
            }
            LocationError::ServiceUnavailable => "Location information unavailable.",
            LocationError::Timeout => "Location request timed out.",
            LocationError::Other(_) => "An unknown error occurred while getting location.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let errors = vec![
            AppError::Network(NetworkError::Timeout),
            AppError::Network(NetworkError::Offline),
            AppError::Persistence(PersistenceError::Corrupt("test".into())),
            AppError::Config(ConfigError::Invalid("test".into())),
            AppError::Location(LocationError::PermissionDenied),
        ];

        for err in errors {
            assert!(!err.user_message().is_empty(), "empty message for {:?}", err);
        }
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = LocationError::PermissionDenied.into();
        assert!(matches!(
            app_err,
            AppError::Location(LocationError::PermissionDenied)
        ));
    }

    #[test]
    fn test_server_errors_use_distinct_message() {
        let server = NetworkError::HttpFailure {
            status: 503,
            message: "unavailable".into(),
        };
        let client = NetworkError::HttpFailure {
            status: 400,
            message: "bad request".into(),
        };
        assert_ne!(server.user_message(), client.user_message());
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Network(NetworkError::Timeout).is_transient());
        assert!(AppError::Network(NetworkError::Offline).is_transient());
        assert!(!AppError::Network(NetworkError::HttpFailure {
            status: 404,
            message: String::new()
        })
        .is_transient());
        assert!(!AppError::Location(LocationError::PermissionDenied).is_transient());
    }

    #[test]
    fn test_io_not_found_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            PersistenceError::from(io),
            PersistenceError::Unavailable(_)
        ));
    }
}
