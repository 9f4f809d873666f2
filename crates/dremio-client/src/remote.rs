//! Transport seam between the reflection logic and the remote REST API.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientResult;

/// HTTP verbs used against the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Create or invoke.
    Post,
    /// Replace.
    Put,
}

impl Method {
    /// Upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// A single request relative to the versioned REST root.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Endpoint path without a leading `/`.
    pub endpoint: String,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Build a request; a leading `/` on the endpoint is dropped.
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = match endpoint.strip_prefix('/') {
            Some(stripped) => stripped.to_string(),
            None => endpoint,
        };
        Self {
            method,
            endpoint,
            body,
        }
    }

    /// `GET endpoint`.
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint, None)
    }

    /// `POST endpoint` with a JSON body.
    #[must_use]
    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint, Some(body))
    }

    /// `PUT endpoint` with a JSON body.
    #[must_use]
    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, endpoint, Some(body))
    }
}

/// Authenticated request/response transport.
///
/// Implementations return `Ok(None)` for responses without a body (204) and
/// surface every non-2xx response as an error.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Issue `request` and decode the JSON response.
    async fn send(&self, request: ApiRequest) -> ClientResult<Option<Value>>;
}
