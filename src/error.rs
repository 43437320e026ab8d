use thiserror::Error;

/// Error type for unistore operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Cannot decode field `{field}` in row {row}: {message}")]
    Decode {
        field: String,
        row: usize,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a [`StoreError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StoreUnavailable,
    StatementError,
    ConnectionError,
    DecodeError,
    ConfigError,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
            StoreError::Statement(_) => ErrorKind::StatementError,
            StoreError::Connection(_) => ErrorKind::ConnectionError,
            StoreError::Decode { .. } => ErrorKind::DecodeError,
            StoreError::Config(_) => ErrorKind::ConfigError,
        }
    }

    pub(crate) fn decode(field: &str, row: usize, message: impl Into<String>) -> Self {
        StoreError::Decode {
            field: field.to_string(),
            row,
            message: message.into(),
        }
    }
}

/// Result type alias for unistore operations
pub type Result<T> = std::result::Result<T, StoreError>;
