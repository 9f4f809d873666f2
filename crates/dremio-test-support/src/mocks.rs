//! In-memory [`RemoteClient`] driven by scripted responses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dremio_client::{ApiRequest, ClientError, ClientResult, Method, RemoteClient};
use serde_json::Value;

/// Canned reply for a method and endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// 2xx with a JSON body.
    Json(Value),
    /// 204 without a body.
    Empty,
    /// Non-success status.
    Status {
        /// Status code.
        status: u16,
        /// Body text.
        body: String,
    },
}

/// Test double for the remote transport.
///
/// Responses are queued per `(method, endpoint)`. Each call consumes the head
/// of the queue; the last entry is sticky so a single scripted reply answers
/// every call. Unscripted endpoints answer 404 and every request is recorded.
#[derive(Debug, Default)]
pub struct FakeRemoteClient {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    routes: HashMap<(Method, String), VecDeque<ScriptedResponse>>,
    requests: Vec<ApiRequest>,
}

impl FakeRemoteClient {
    /// Client with no scripted routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `response` for `method endpoint`.
    pub fn on(&self, method: Method, endpoint: &str, response: ScriptedResponse) -> &Self {
        self.state()
            .routes
            .entry((method, endpoint.trim_start_matches('/').to_string()))
            .or_default()
            .push_back(response);
        self
    }

    /// Queue a JSON reply.
    pub fn on_json(&self, method: Method, endpoint: &str, body: Value) -> &Self {
        self.on(method, endpoint, ScriptedResponse::Json(body))
    }

    /// Queue a 204 reply.
    pub fn on_empty(&self, method: Method, endpoint: &str) -> &Self {
        self.on(method, endpoint, ScriptedResponse::Empty)
    }

    /// Queue a failure status.
    pub fn on_status(&self, method: Method, endpoint: &str, status: u16) -> &Self {
        self.on(
            method,
            endpoint,
            ScriptedResponse::Status {
                status,
                body: format!("scripted status {status}"),
            },
        )
    }

    /// Queue a sequence of JSON replies served in order.
    pub fn on_sequence<I>(&self, method: Method, endpoint: &str, bodies: I) -> &Self
    where
        I: IntoIterator<Item = Value>,
    {
        for body in bodies {
            self.on_json(method, endpoint, body);
        }
        self
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state().requests.clone()
    }

    /// Requests received for `method endpoint`.
    #[must_use]
    pub fn requests_to(&self, method: Method, endpoint: &str) -> Vec<ApiRequest> {
        self.state()
            .requests
            .iter()
            .filter(|request| request.method == method && request.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Number of requests received for `method endpoint`.
    #[must_use]
    pub fn count(&self, method: Method, endpoint: &str) -> usize {
        self.requests_to(method, endpoint).len()
    }

    /// Whether any request used `method`.
    #[must_use]
    pub fn called_with(&self, method: Method) -> bool {
        self.state()
            .requests
            .iter()
            .any(|request| request.method == method)
    }
}

#[async_trait]
impl RemoteClient for FakeRemoteClient {
    async fn send(&self, request: ApiRequest) -> ClientResult<Option<Value>> {
        let mut state = self.state();
        let key = (request.method, request.endpoint.clone());
        let url = format!("fake://{}", request.endpoint);
        let method = request.method.as_str();
        state.requests.push(request);

        let response = match state.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match response {
            Some(ScriptedResponse::Json(body)) => Ok(Some(body)),
            Some(ScriptedResponse::Empty) => Ok(None),
            Some(ScriptedResponse::Status { status, body }) => Err(ClientError::Status {
                method,
                url,
                status,
                body,
            }),
            None => Err(ClientError::Status {
                method,
                url,
                status: 404,
                body: "no scripted response".to_string(),
            }),
        }
    }
}
