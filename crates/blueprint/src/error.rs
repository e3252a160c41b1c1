//! Error types for blueprint

use thiserror::Error;

/// Result type alias for blueprint operations
pub type BlueprintResult<T> = Result<T, BlueprintError>;

/// Which kind of identifier a whitelist rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Table,
    Column,
}

impl std::fmt::Display for IdentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentKind::Table => f.write_str("table"),
            IdentKind::Column => f.write_str("column"),
        }
    }
}

/// Coarse classification of a [`BlueprintError`].
///
/// Callers that only care about "what went wrong" (e.g. to treat whitelist
/// rejections as security events) can match on this instead of the full enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Shape,
    Enum,
    Whitelist,
    PatternMismatch,
    NotRegistered,
    Execution,
}

/// Error types for statement compilation and execution
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// Statement (or connection) is missing something it needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input had the wrong shape (positional keys, non-string names, ...)
    #[error("Shape error: {0}")]
    Shape(String),

    /// A keyword-like value outside its allowed set
    #[error("Disallowed {kind} '{value}': must be one of {allowed}")]
    Enum {
        kind: &'static str,
        value: String,
        allowed: &'static str,
    },

    /// Identifier rejected by a configured whitelist
    #[error("{kind} '{name}' in {clause} not found in whitelist")]
    Whitelist {
        kind: IdentKind,
        name: String,
        clause: &'static str,
    },

    /// UPDATE/INSERT column outside the declared column set
    #[error("Pattern mismatch: column '{column}' in table '{table}' failed validation in {statement}")]
    PatternMismatch {
        statement: &'static str,
        table: String,
        column: String,
    },

    /// Pattern, filter or transformation name not registered on a blueprint
    #[error("Could not use {kind} '{name}': not registered")]
    NotRegistered { kind: &'static str, name: String },

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// PostgreSQL execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// MySQL execution error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySql(#[from] sqlx::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Statement timed out in the execution adapter
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Expected a row, got none
    #[error("Not found: {0}")]
    NotFound(String),
}

impl BlueprintError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a shape error
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub(crate) fn whitelist(kind: IdentKind, name: impl Into<String>, clause: &'static str) -> Self {
        Self::Whitelist {
            kind,
            name: name.into(),
            clause,
        }
    }

    pub(crate) fn pattern_mismatch(
        statement: &'static str,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::PatternMismatch {
            statement,
            table: table.into(),
            column: column.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Shape(_) => ErrorKind::Shape,
            Self::Enum { .. } => ErrorKind::Enum,
            Self::Whitelist { .. } => ErrorKind::Whitelist,
            Self::PatternMismatch { .. } => ErrorKind::PatternMismatch,
            Self::NotRegistered { .. } => ErrorKind::NotRegistered,
            _ => ErrorKind::Execution,
        }
    }

    /// Check if this is a whitelist rejection
    pub fn is_whitelist(&self) -> bool {
        matches!(self, Self::Whitelist { .. })
    }

    /// Check if this is a pattern mismatch
    pub fn is_pattern_mismatch(&self) -> bool {
        matches!(self, Self::PatternMismatch { .. })
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for BlueprintError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
