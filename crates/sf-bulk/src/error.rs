//! Error types for sf-bulk.

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

    /// The Salesforce error code and message, if the server rejected the call.
    pub fn api_error(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ErrorKind::SalesforceApi {
                error_code,
                message,
            } => Some((error_code, message)),
            _ => None,
        }
    }

    /// True for a local polling timeout. The remote job keeps running.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Client error: {0}")]
    Client(String),
    #[error("Salesforce API error: {error_code} - {message}")]
    SalesforceApi { error_code: String, message: String },
    #[error("Query error: {0}")]
    Query(String),
    #[error("Record error: {0}")]
    Records(String),
    #[error("Job error: {0}")]
    Job(String),
    #[error("Timeout: {0}")]
    Timeout(String),
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

impl From<sf_toolkit_rest::Error> for Error {
    fn from(err: sf_toolkit_rest::Error) -> Self {
        let kind = match &err.kind {
            sf_toolkit_rest::ErrorKind::Validation(message) => {
                ErrorKind::Validation(message.clone())
            }
            _ => match err.api_error() {
                Some((code, message)) => ErrorKind::SalesforceApi {
                    error_code: code.to_string(),
                    message: message.to_string(),
                },
                None => ErrorKind::Query(err.to_string()),
            },
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_passes_through() {
        let err = Error::from(sf_toolkit_client::Error::new(
            sf_toolkit_client::ErrorKind::SalesforceApi {
                error_code: "INVALIDJOB".to_string(),
                message: "Job not found".to_string(),
                fields: vec![],
            },
        ));
        assert_eq!(err.api_error(), Some(("INVALIDJOB", "Job not found")));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_query_validation_stays_validation() {
        let rest = sf_toolkit_rest::QueryBuilder::new("Account")
            .unwrap()
            .select(["Id"])
            .unwrap()
            .offset(10)
            .build_for_bulk()
            .unwrap_err();
        let err = Error::from(rest);
        assert!(matches!(err.kind, ErrorKind::Validation(_)));
    }
}
