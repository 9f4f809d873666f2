//! Error types for connection configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No profile exists for the connection reference.
    #[error("connection '{conn_id}' is not configured")]
    MissingConnection {
        /// Connection reference that was requested.
        conn_id: String,
    },
    /// Profile document was not valid JSON.
    #[error("connection '{conn_id}' is not a valid JSON document")]
    InvalidDocument {
        /// Connection reference being parsed.
        conn_id: String,
        /// Source parse error.
        source: serde_json::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid value for '{field}' in connection '{conn_id}': {reason}")]
    InvalidField {
        /// Connection reference being parsed.
        conn_id: String,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when it is safe to report.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
