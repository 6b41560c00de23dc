use thiserror::Error;

/// Failure to obtain a response from the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Cache manager lifecycle, messaging and snapshot errors.
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Failed to precache {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("Cache manager has not been installed")]
    NotInstalled,

    #[error("Failed to prefetch {url}: {reason}")]
    Prefetch { url: String, reason: String },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid control message: {0}")]
    InvalidMessage(#[source] serde_json::Error),

    #[error("Cache snapshot is unreadable: {0}")]
    Snapshot(#[source] serde_json::Error),

    #[error("Cache snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache worker has stopped")]
    WorkerStopped,
}

impl OfflineError {
    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        OfflineError::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_error_names_url() {
        let err = OfflineError::Install {
            url: "http://localhost:8080/styles.css".into(),
            reason: "HTTP 404".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to precache http://localhost:8080/styles.css: HTTP 404"
        );
    }

    #[test]
    fn test_invalid_url_keeps_source() {
        let source = url::Url::parse("not a url").unwrap_err();
        let err = OfflineError::invalid_url("not a url", source);
        assert!(std::error::Error::source(&err).is_some());
    }
}
