//! Error types
//!
//! Every failure in this crate is local and synchronous: it stems from a
//! malformed tree, a conflicting schema declaration or a bad source file,
//! never from a transient condition, so nothing here is retried.

use std::path::PathBuf;

/// Result alias used throughout the crate
pub type DepotResult<T> = Result<T, DepotError>;

#[derive(Debug, thiserror::Error)]
pub enum DepotError {
    // Build-time expression errors
    #[error("in() condition on `{column}` needs at least one value")]
    EmptyInList { column: String },

    #[error("`{operator}` needs at least one operand")]
    EmptyOperator { operator: &'static str },

    #[error("query can't contain multiple {clause} clauses")]
    DuplicateClause { clause: &'static str },

    // Compiler errors
    #[error("{context} references record `{record}` which is not bound by from or join")]
    UnboundRecord { record: String, context: String },

    #[error("{context} references table alias `{alias}` which no join declares")]
    UnknownAlias { alias: String, context: String },

    #[error("{context} reuses table alias `{alias}`; give the join an alias of its own")]
    AliasCollision { alias: String, context: String },

    #[error("record `{record}` was never registered with this statement")]
    UnknownRecord { record: String },

    #[error("unknown field on persistent record [record={record}, field={field}]")]
    UnknownField { record: String, field: String },

    #[error("can not nest selects on the same persistent record `{record}`")]
    NestedSelect { record: String },

    #[error("refusing to update `{record}` without a where clause")]
    MissingWhere { record: String },

    #[error("no value supplied for column `{field}` of `{record}`")]
    MissingValue { record: String, field: String },

    #[error("key does not match primary key of `{record}`: {reason}")]
    KeyMismatch { record: String, reason: String },

    #[error("query on computed record `{record}` needs a from override")]
    ComputedWithoutFrom { record: String },

    #[error("invalid field definition for `{record}.{field}`: {reason}")]
    InvalidDefinition {
        record: String,
        field: String,
        reason: &'static str,
    },

    #[error("persistent field has no definition [record={record}, field={field}]")]
    NoDefinition { record: String, field: String },

    // Schema reflection errors
    #[error("invalid schema for `{record}`: {reason}")]
    InvalidSchema { record: String, reason: String },

    #[error("invalid shadow on `{record}.{field}`: {reason}")]
    InvalidShadow {
        record: String,
        field: String,
        reason: String,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    // Codegen errors
    #[error("found {found} marker (at line {line}) but no {missing} marker")]
    MarkerMismatch {
        found: &'static str,
        missing: &'static str,
        line: usize,
    },

    #[error("failed to parse source: {0}")]
    Parse(#[from] syn::Error),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Reported by the external connection provider
    #[error("execution failed: {0}")]
    Execution(String),
}

impl DepotError {
    pub fn unbound(record: impl std::fmt::Display, context: impl Into<String>) -> Self {
        Self::UnboundRecord {
            record: record.to_string(),
            context: context.into(),
        }
    }

    pub fn unknown_field(record: impl std::fmt::Display, field: impl Into<String>) -> Self {
        Self::UnknownField {
            record: record.to_string(),
            field: field.into(),
        }
    }

    pub fn invalid_schema(record: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            record: record.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}
