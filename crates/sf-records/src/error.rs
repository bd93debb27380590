//! Error types for sf-toolkit-records.

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

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn codec(field: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Codec {
            field: field.to_string(),
            value: value.into(),
            reason: reason.into(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// A raw value could not be coerced into the field's declared type.
    #[error("Cannot decode {value:?} for field {field}: {reason}")]
    Codec {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Field {field} is not defined on {sobject}")]
    UnknownField { sobject: String, field: String },

    #[error("Field {field} expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Field {0} is read-only")]
    ReadOnly(String),

    #[error("No schema registered for {0}")]
    SchemaUnknown(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::with_source(ErrorKind::Csv(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}
