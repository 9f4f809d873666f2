//! Error types for the remote transport.

use thiserror::Error;

/// Primary error type for remote requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL or endpoint could not be turned into a request URL.
    #[error("invalid request URL")]
    InvalidUrl {
        /// Offending input.
        url: String,
        /// Source parse error.
        source: url::ParseError,
    },
    /// Transport-level failure.
    #[error("{method} request failed")]
    Http {
        /// HTTP method.
        method: &'static str,
        /// Target URL.
        url: String,
        /// Source transport error.
        source: reqwest::Error,
    },
    /// Remote service answered with a non-success status.
    #[error("{method} {url} returned status {status}")]
    Status {
        /// HTTP method.
        method: &'static str,
        /// Target URL.
        url: String,
        /// Status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// Response body was not valid JSON.
    #[error("failed to decode response body")]
    Decode {
        /// Target URL.
        url: String,
        /// Source parse error.
        source: serde_json::Error,
    },
    /// Credentials were unusable or token acquisition failed.
    #[error("authentication failed: {reason}")]
    Auth {
        /// Human-readable reason.
        reason: String,
    },
    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    Build {
        /// Source builder error.
        source: reqwest::Error,
    },
}

impl ClientError {
    /// HTTP status code, when the failure came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote service reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

/// Convenience alias for transport results.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected_from_status() {
        let err = ClientError::Status {
            method: "GET",
            url: "http://h/api/v3/catalog/by-path/a".into(),
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));

        let err = ClientError::Auth {
            reason: "no token".into(),
        };
        assert!(!err.is_not_found());
        assert_eq!(err.status(), None);
    }
}
