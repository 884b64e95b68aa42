//! Error types for lode-db

use thiserror::Error;

/// Database operation errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] database connection failed: {0}")]
    Connection(String),

    /// Statement execution error, carrying the offending statement (D002)
    #[error("[D002] SQL execution failed for `{statement}`: {message}")]
    Execution { statement: String, message: String },

    /// Referenced table does not exist (D003)
    ///
    /// A recoverable condition, not a failure: column introspection returns
    /// it for tables that were never created, and collaborators use it for
    /// first-run fallbacks.
    #[error("[D003] no such table: {0}")]
    NoSuchTable(String),

    /// Transaction control error (D004)
    #[error("[D004] transaction control failed: {0}")]
    Transaction(String),

    /// Requested configuration parameter was never set (D005)
    #[error("[D005] parameter '{0}' is not set")]
    ParameterNotFound(String),

    /// Update-log timestamp did not parse (D006)
    #[error("[D006] malformed update-log timestamp '{value}': {message}")]
    Timestamp { value: String, message: String },
}

/// Result type alias for [`DbError`].
pub type DbResult<T> = Result<T, DbError>;
