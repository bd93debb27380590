//! Error types for sf-toolkit-rest.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// The Salesforce error code and message, if the remote API rejected the request.
    pub fn api_error(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ErrorKind::SalesforceApi {
                error_code,
                message,
            } => Some((error_code.as_str(), message.as_str())),
            _ => None,
        }
    }

    /// True if the request failed below the API layer (timeouts, 5xx, ...).
    pub fn is_transport(&self) -> bool {
        self.source
            .as_ref()
            .and_then(|source| source.downcast_ref::<sf_toolkit_client::Error>())
            .is_some_and(sf_toolkit_client::Error::is_transport)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Rejected locally before any request was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Salesforce API error: {error_code} - {message}")]
    SalesforceApi { error_code: String, message: String },

    #[error("Record error: {0}")]
    Records(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

impl From<sf_toolkit_client::Error> for Error {
    fn from(err: sf_toolkit_client::Error) -> Self {
        let kind = match err.api_error() {
            Some((code, message)) => ErrorKind::SalesforceApi {
                error_code: code.to_string(),
                message: message.to_string(),
            },
            None => ErrorKind::Client(err.to_string()),
        };
        Error {
            kind,
            source: Some(Box::new(err)),
        }
    }
}

impl From<sf_toolkit_records::Error> for Error {
    fn from(err: sf_toolkit_records::Error) -> Self {
        Error {
            kind: ErrorKind::Records(err.to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Json(err.to_string()),
            source: Some(Box::new(err)),
        }
    }
}
