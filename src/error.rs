//! Error types for Rollbook
//!
//! Every failure in the persistence layer is converted to `AppError`.
//! [`AppError::kind`] folds the variants into the small taxonomy the
//! read/write paths use to decide between retrying, degrading and
//! surfacing an error.

use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Local SQLite store failure (always fatal)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Rate limiting or transient remote fault that survived every retry
    #[error("Remote store temporarily unavailable: {0}")]
    RemoteTransient(String),

    /// Remote collection for a table is absent and could not be created
    #[error("Remote collection missing: {0}")]
    RemoteSchemaMissing(String),

    /// Authentication or configuration of the remote store is invalid
    #[error("Remote connection error: {0}")]
    RemoteFatal(String),

    /// Any other remote failure
    #[error("Remote store error: {0}")]
    Remote(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record could not be decoded into its typed form
    #[error("Validation error: {0}")]
    Validation(String),

    /// Table name does not match any of the fixed tables
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote store hit a retryable fault
    RemoteTransient,
    /// Remote collection absent
    RemoteSchemaMissing,
    /// Remote credentials/configuration rejected
    RemoteFatal,
    /// Local store could not be read or written
    LocalIo,
    /// Caller supplied bad input (unknown table, undecodable record)
    Invalid,
    /// Everything else
    Internal,
}

impl ErrorKind {
    /// Label used for metrics and structured logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RemoteTransient => "remote_transient",
            ErrorKind::RemoteSchemaMissing => "remote_schema_missing",
            ErrorKind::RemoteFatal => "remote_fatal",
            ErrorKind::LocalIo => "local_io",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Internal => "internal",
        }
    }
}

impl AppError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Database(_) => ErrorKind::LocalIo,
            AppError::RemoteTransient(_) | AppError::HttpClient(_) => ErrorKind::RemoteTransient,
            AppError::RemoteSchemaMissing(_) => ErrorKind::RemoteSchemaMissing,
            AppError::RemoteFatal(_) => ErrorKind::RemoteFatal,
            AppError::Validation(_) | AppError::UnknownTable(_) | AppError::Config(_) => {
                ErrorKind::Invalid
            }
            AppError::Remote(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error must halt the caller instead of degrading
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::LocalIo | ErrorKind::RemoteFatal)
    }

    pub(crate) fn record(&self) {
        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind().as_str()])
            .inc();
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<crate::remote::RemoteError> for AppError {
    fn from(err: crate::remote::RemoteError) -> Self {
        use crate::remote::RemoteError;

        match err {
            RemoteError::CollectionMissing(table) => AppError::RemoteSchemaMissing(table),
            RemoteError::Transient(msg) => AppError::RemoteTransient(msg),
            RemoteError::Fatal(msg) => AppError::RemoteFatal(msg),
            RemoteError::Other(msg) => AppError::Remote(msg),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;

    #[test]
    fn local_failures_are_fatal() {
        let error = AppError::Database(sqlx::Error::PoolClosed);
        assert_eq!(error.kind(), ErrorKind::LocalIo);
        assert!(error.is_fatal());
    }

    #[test]
    fn remote_errors_keep_their_kind() {
        let missing: AppError = RemoteError::CollectionMissing("Tasks".to_string()).into();
        assert_eq!(missing.kind(), ErrorKind::RemoteSchemaMissing);
        assert!(!missing.is_fatal());

        let fatal: AppError = RemoteError::Fatal("bad token".to_string()).into();
        assert!(fatal.is_fatal());

        let transient: AppError = RemoteError::Transient("429".to_string()).into();
        assert_eq!(transient.kind(), ErrorKind::RemoteTransient);
    }
}
