//! # Design
//!
//! - Task-level errors wrap the crate error that caused them.
//! - Messages stay constant; context lives in the `operation` field.
//! - Reflection failures remain reachable so hosts can classify them.

use dremio_client::ClientError;
use dremio_config::ConfigError;
use dremio_core::ReflectionError;
use thiserror::Error;

/// Result alias for task operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Task-level error type.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Connection profile could not be loaded.
    #[error("connection configuration failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// Remote client could not be constructed.
    #[error("remote client construction failed")]
    Client {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: ClientError,
    },
    /// Reconciliation, tracking or a remote call failed.
    #[error("reflection operation failed")]
    Reflection {
        /// Operation identifier.
        operation: &'static str,
        /// Source reflection error.
        source: ReflectionError,
    },
}

impl RuntimeError {
    /// Wrap a reflection failure.
    #[must_use]
    pub const fn reflection(operation: &'static str, source: ReflectionError) -> Self {
        Self::Reflection { operation, source }
    }

    /// Underlying reflection failure, if that is what occurred.
    #[must_use]
    pub const fn as_reflection(&self) -> Option<&ReflectionError> {
        match self {
            Self::Reflection { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn reflection_failures_stay_reachable() {
        let err = RuntimeError::reflection(
            "reflection.reconcile",
            ReflectionError::validation("name", "is mandatory"),
        );
        assert_eq!(err.to_string(), "reflection operation failed");
        assert!(matches!(
            err.as_reflection(),
            Some(ReflectionError::Validation { field: "name", .. })
        ));
        assert!(err.source().is_some());

        let err = RuntimeError::Config {
            operation: "connection.load",
            source: ConfigError::MissingConnection {
                conn_id: "x".into(),
            },
        };
        assert!(err.as_reflection().is_none());
    }
}
