//! Error taxonomy shared by reconciliation and completion tracking.

use std::error::Error;
use std::time::Duration;

use thiserror::Error;

/// Primary error type for reflection management operations.
#[derive(Debug, Error)]
pub enum ReflectionError {
    /// Desired specification or task arguments were malformed or incomplete.
    #[error("invalid reflection request: '{field}' {reason}")]
    Validation {
        /// Offending field or argument.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Source path did not resolve to a catalog entity.
    #[error("catalog entity '{path}' not found")]
    NotFound {
        /// Dotted source path supplied by the caller.
        path: String,
    },
    /// Remote system reported a status outside the known taxonomy.
    #[error("'{value}' is not a valid {taxonomy} status")]
    InvalidStatus {
        /// Taxonomy the value was validated against.
        taxonomy: &'static str,
        /// Raw status value.
        value: String,
    },
    /// Transport failure or non-success response from the remote system.
    #[error("remote call '{operation}' failed")]
    RemoteCall {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Remote response was well-formed but lacked required content.
    #[error("unexpected response from '{operation}': {detail}")]
    UnexpectedResponse {
        /// Operation identifier.
        operation: &'static str,
        /// What was missing or malformed.
        detail: String,
    },
    /// Completion was not observed before the deadline.
    #[error("reflection {reflection_id} has not completed after {}s", .timeout.as_secs())]
    Timeout {
        /// Reflection being tracked.
        reflection_id: String,
        /// Configured timeout.
        timeout: Duration,
    },
    /// Remote job or refresh reached a terminal failure state.
    #[error("{id} finished in state {state}")]
    RemoteJobFailed {
        /// Reflection or job identifier.
        id: String,
        /// Terminal state (or event status) observed.
        state: String,
        /// Error detail reported by the remote system, when available.
        message: Option<String>,
    },
}

impl ReflectionError {
    /// Wrap a transport-level failure for the given operation.
    pub fn remote(operation: &'static str, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::RemoteCall {
            operation,
            source: source.into(),
        }
    }

    /// Build a validation failure.
    #[must_use]
    pub const fn validation(field: &'static str, reason: &'static str) -> Self {
        Self::Validation { field, reason }
    }

    /// Whether the failure originates from caller input rather than the remote system.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }
}

/// Convenience alias for reflection operation results.
pub type ReflectionResult<T> = Result<T, ReflectionError>;
