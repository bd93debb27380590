//! Error types for sf-toolkit-client.

use std::time::Duration;

/// Result type alias for connection-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for connection-level operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if the request never produced a usable response:
    /// timeouts, refused connections, throttling, 5xx, exhausted retries.
    pub fn is_transport(&self) -> bool {
        match &self.kind {
            ErrorKind::Timeout
            | ErrorKind::Connection(_)
            | ErrorKind::RateLimited { .. }
            | ErrorKind::RetriesExhausted { .. } => true,
            ErrorKind::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication(_))
    }

    /// Returns the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// The Salesforce error code and message, if the remote API rejected the request.
    pub fn api_error(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ErrorKind::SalesforceApi {
                error_code,
                message,
                ..
            } => Some((error_code.as_str(), message.as_str())),
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// HTTP request failed.
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited{}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Authentication error (HTTP 401).
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization error (HTTP 403).
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Resource not found (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Salesforce API error response.
    #[error("Salesforce API error: {error_code} - {message}")]
    SalesforceApi {
        error_code: String,
        message: String,
        fields: Vec<String>,
    },

    /// All retries exhausted.
    #[error("All {attempts} retry attempts exhausted")]
    RetriesExhausted { attempts: u32 },

    /// No connection is registered under the name.
    #[error("No connection registered as '{0}'")]
    NotRegistered(String),

    /// A connection is already registered under the name.
    #[error("Connection '{0}' has already been registered")]
    AlreadyRegistered(String),

    /// The blocking runtime could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::RateLimited { .. } => true,
            ErrorKind::Timeout => true,
            ErrorKind::Connection(_) => true,
            ErrorKind::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("Invalid URL: {}", err)), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(Error::new(ErrorKind::Timeout).is_transport());
        assert!(Error::new(ErrorKind::Connection("refused".into())).is_transport());
        assert!(Error::new(ErrorKind::RetriesExhausted { attempts: 3 }).is_transport());
        assert!(Error::new(ErrorKind::Http {
            status: 502,
            message: "bad gateway".into()
        })
        .is_transport());

        assert!(!Error::new(ErrorKind::Http {
            status: 400,
            message: "bad request".into()
        })
        .is_transport());
        assert!(!Error::new(ErrorKind::SalesforceApi {
            error_code: "MALFORMED_QUERY".into(),
            message: "unexpected token".into(),
            fields: vec![],
        })
        .is_transport());
    }

    #[test]
    fn test_api_error_accessor() {
        let err = Error::new(ErrorKind::SalesforceApi {
            error_code: "INVALID_FIELD".to_string(),
            message: "No such column 'foo' on entity 'Account'".to_string(),
            fields: vec!["foo".to_string()],
        });

        assert!(!err.is_retryable());
        assert_eq!(
            err.api_error(),
            Some(("INVALID_FIELD", "No such column 'foo' on entity 'Account'"))
        );
        assert!(Error::new(ErrorKind::Timeout).api_error().is_none());
    }

    #[test]
    fn test_retryable_http_status_codes() {
        for status in [429, 500, 502, 503, 504] {
            let err = Error::new(ErrorKind::Http {
                status,
                message: "error".into(),
            });
            assert!(err.is_retryable(), "HTTP {status} should be retryable");
        }

        for status in [400, 401, 403, 404, 409] {
            let err = Error::new(ErrorKind::Http {
                status,
                message: "error".into(),
            });
            assert!(!err.is_retryable(), "HTTP {status} should NOT be retryable");
        }
    }

    #[test]
    fn test_rate_limit_retry_after() {
        let err = Error::new(ErrorKind::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        });
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert!(err.to_string().contains("retry after"));
    }

    #[test]
    fn test_registry_error_messages() {
        assert_eq!(
            ErrorKind::NotRegistered("sandbox".into()).to_string(),
            "No connection registered as 'sandbox'"
        );
        assert_eq!(
            ErrorKind::AlreadyRegistered("default".into()).to_string(),
            "Connection 'default' has already been registered"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err.kind, ErrorKind::Json(_)));
        assert!(err.source.is_some());
    }
}
