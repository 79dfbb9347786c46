//! Error types shared across the client core and the tool layer.

use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// Errors raised by the archive client.
///
/// Validation and configuration errors are always raised before any network
/// attempt is made.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Bad or missing settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation attempted outside an active client scope
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// The query cannot be executed as built
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Malformed identifier or parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifier has no matching record
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Tool input violates the tool's schema
    #[error("Schema validation failed at '{field}' ({constraint}): {message}")]
    SchemaValidation {
        /// JSON pointer of the offending input value
        field: String,
        /// Schema keyword that failed (e.g. `enum`, `maximum`, `required`)
        constraint: String,
        /// Validator message
        message: String,
    },

    /// No tool registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Network or upstream failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The caller's cancellation token fired before the operation completed
    #[error("Operation cancelled")]
    Cancelled,
}

/// Serializable discriminant of [`ArchiveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Lifecycle,
    InvalidQuery,
    InvalidArgument,
    NotFound,
    SchemaValidation,
    UnknownTool,
    Transport,
    Cancelled,
}

impl ErrorKind {
    /// Stable snake_case name, as used in tool envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Lifecycle => "lifecycle",
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SchemaValidation => "schema_validation",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ArchiveError {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Configuration(_) => ErrorKind::Configuration,
            ArchiveError::Lifecycle(_) => ErrorKind::Lifecycle,
            ArchiveError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            ArchiveError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ArchiveError::NotFound(_) => ErrorKind::NotFound,
            ArchiveError::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            ArchiveError::UnknownTool(_) => ErrorKind::UnknownTool,
            ArchiveError::Transport(_) => ErrorKind::Transport,
            ArchiveError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Only transient transport failures qualify; everything else is a
    /// property of the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, ArchiveError::Transport(e) if e.is_transient())
    }
}

/// Result alias for archive operations
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
