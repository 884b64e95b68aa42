//! Error types for lode-build

use lode_core::{ScriptError, TableName};
use lode_db::DbError;
use thiserror::Error;

/// Build-engine errors.
#[derive(Error, Debug)]
pub enum BuildError {
    /// B001: A table refresh failed; earlier tables of the run stay committed
    #[error("[B001] update of table '{table}' failed: {source}")]
    TableUpdate {
        table: TableName,
        #[source]
        source: TableUpdateError,
    },

    /// B002: Refresh requested for a name missing from the registry
    #[error("[B002] unknown table '{0}' requested for refresh")]
    UnknownTable(TableName),

    /// B003: Two tables registered under the same name
    #[error("[B003] table '{0}' is already registered")]
    DuplicateTable(TableName),

    /// B004: The registered schema is not refreshable in any order
    #[error("[B004] circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// Definition-script validation failure
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Database failure outside any table update
    #[error(transparent)]
    Db(#[from] DbError),
}

/// What went wrong inside a single table update.
#[derive(Error, Debug)]
pub enum TableUpdateError {
    /// The extracted batch does not have the declared column shape
    #[error("incompatible data: expected columns {expected:?}, found fields {found:?}")]
    IncompatibleData {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// The extraction callable itself failed
    #[error("extraction failed: {0}")]
    Extraction(#[source] anyhow::Error),

    /// The underlying engine rejected a statement
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type alias for [`BuildError`].
pub type BuildResult<T> = Result<T, BuildError>;
