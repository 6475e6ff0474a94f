use thiserror::Error;

use crate::config_manager::ConfigError;

#[derive(Error, Debug)]
pub enum ApiCovError {
    #[error("Failed to load API specification: {0}")]
    SpecLoad(String),

    #[error("No API specification loaded; load a spec before analyzing coverage")]
    SpecNotLoaded,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unsupported export format: {0}")]
    UnsupportedExportFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ApiCovError>;

/// Failure raised by an [`HttpCollaborator`](crate::HttpCollaborator).
///
/// The interceptor records an observation for every variant before handing
/// the error back to the caller untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{method} {url} failed: {message}")]
    Failed {
        method: String,
        url: String,
        message: String,
    },

    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: Option<String>,
    },

    #[error("{method} {url} timed out after {elapsed_ms}ms")]
    Timeout {
        method: String,
        url: String,
        elapsed_ms: u64,
    },

    #[error("{method} {url} was cancelled")]
    Cancelled { method: String, url: String },
}

impl TransportError {
    /// Status code carried by the failure, if the target answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            TransportError::Failed { url, .. }
            | TransportError::Status { url, .. }
            | TransportError::Timeout { url, .. }
            | TransportError::Cancelled { url, .. } => url,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            TransportError::Failed { method, .. }
            | TransportError::Status { method, .. }
            | TransportError::Timeout { method, .. }
            | TransportError::Cancelled { method, .. } => method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_only_reported_for_status_failures() {
        let err = TransportError::Status {
            method: "GET".into(),
            url: "https://h/users".into(),
            status: 404,
            body: None,
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "GET https://h/users returned HTTP 404");

        let err = TransportError::Failed {
            method: "POST".into(),
            url: "https://h/users".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.status(), None);
        assert_eq!(err.url(), "https://h/users");
        assert_eq!(err.method(), "POST");
    }

    #[test]
    fn transport_errors_convert_into_crate_error() {
        let err: ApiCovError = TransportError::Cancelled {
            method: "GET".into(),
            url: "/x".into(),
        }
        .into();
        assert!(matches!(err, ApiCovError::Transport(_)));
    }
}
