//! Error types for repograde core.

use std::{error::Error, fmt, io};

/// Error type for repograde core operations.
#[derive(Debug)]
pub enum AuditError {
    /// An underlying I/O error.
    Io(io::Error),
    /// The repository (or its root listing) does not exist or is not visible.
    RepositoryNotFound {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
    },
    /// A path inside the repository was not found.
    NotFound(String),
    /// The hosting provider rejected the request because of rate limiting.
    RateLimited(String),
    /// The hosting provider answered with an unexpected status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or context.
        message: String,
    },
    /// The request never produced a response.
    Network(String),
    /// A response or file could not be decoded.
    Decode(String),
    /// An external call exceeded its time budget.
    Timeout(String),
    /// Invalid configuration or rule input.
    Config(String),
}

impl AuditError {
    /// Whether the error describes a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::RepositoryNotFound { .. })
    }
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::RepositoryNotFound { owner, repo } => {
                write!(f, "repository not found: {owner}/{repo}")
            }
            Self::NotFound(path) => write!(f, "not found: {path}"),
            Self::RateLimited(message) => write!(f, "rate limited: {message}"),
            Self::Http { status, message } => write!(f, "http error ({status}): {message}"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Decode(message) => write!(f, "decode error: {message}"),
            Self::Timeout(message) => write!(f, "timed out: {message}"),
            Self::Config(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for AuditError {}

impl From<io::Error> for AuditError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Convenience result type for repograde core.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::AuditError;
    use std::io;

    #[test]
    fn io_error_formats_message() {
        let error = AuditError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(format!("{error}"), "io error: boom");
    }

    #[test]
    fn repository_not_found_names_the_slug() {
        let error = AuditError::RepositoryNotFound {
            owner: "octo".to_string(),
            repo: "missing".to_string(),
        };
        assert_eq!(format!("{error}"), "repository not found: octo/missing");
        assert!(error.is_not_found());
    }

    #[test]
    fn rate_limit_is_not_a_missing_resource() {
        let error = AuditError::RateLimited("quota exhausted".to_string());
        assert!(!error.is_not_found());
        assert_eq!(format!("{error}"), "rate limited: quota exhausted");
    }

    #[test]
    fn from_io_error_maps_variant() {
        let error: AuditError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        match error {
            AuditError::Io(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn timeout_formats_message() {
        let error = AuditError::Timeout("completion after 2s".to_string());
        assert_eq!(format!("{error}"), "timed out: completion after 2s");
    }

    #[test]
    fn from_json_error_maps_to_decode() {
        let error: AuditError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(error, AuditError::Decode(_)));
    }
}
