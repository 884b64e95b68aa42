//! Error types for lode-core

use thiserror::Error;

/// Definition-script validation errors.
///
/// All variants carry the identity of the offending script. They are raised
/// while a schema is being assembled and are never retried: a malformed
/// definition is a build-time defect, not a runtime condition.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// S001: Unexpected number of statements in a definition script
    #[error("[S001] definition script '{script}' must contain {expected} statements, found {found}")]
    StatementCount {
        script: String,
        expected: &'static str,
        found: usize,
    },

    /// S002: Missing or malformed CREATE TABLE statement
    #[error("[S002] definition script '{script}' does not contain `{expected}`")]
    CreateStatement { script: String, expected: String },

    /// S003: Multi-statement script without a populate statement
    #[error("[S003] definition script '{script}' has multiple statements but none contains `{expected}`")]
    InsertStatement { script: String, expected: String },

    /// S004: Column list could not be extracted from a CREATE TABLE body
    #[error("[S004] no columns found in the create statement of '{script}'")]
    ColumnsNotFound { script: String },
}

/// Result type alias for [`ScriptError`].
pub type ScriptResult<T> = Result<T, ScriptError>;
