//! reqwest-backed implementation of [`RemoteClient`].
//!
//! # Design
//! - Every request is sent relative to `{base}/{api_version}/`.
//! - Session tokens for `AuthToken` credentials are fetched lazily on first use
//!   and cached for the lifetime of the client.

use std::time::Duration;

use async_trait::async_trait;
use dremio_config::ConnectionProfile;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Credentials;
use crate::error::{ClientError, ClientResult};
use crate::remote::{ApiRequest, Method, RemoteClient};

/// Value sent in the `User-Agent` header.
pub const USER_AGENT_VALUE: &str = concat!("dremio-reflections-v", env!("CARGO_PKG_VERSION"));

const LOGIN_ENDPOINT: &str = "apiv2/login";

/// HTTP transport for a single connection profile.
pub struct HttpRemoteClient {
    client: Client,
    base_url: Url,
    api_root: Url,
    credentials: Credentials,
    token: OnceCell<String>,
}

impl std::fmt::Debug for HttpRemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteClient")
            .field("api_root", &self.api_root.as_str())
            .field("credentials", &self.credentials)
            .field("token_cached", &self.token.initialized())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

impl HttpRemoteClient {
    /// Build a client for `base_url` with the given REST root and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] for unusable URLs and
    /// [`ClientError::Build`] when the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        api_version: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let base_input = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base_input).map_err(|source| ClientError::InvalidUrl {
            url: base_input.clone(),
            source,
        })?;
        let root_input = format!("{}/", api_version.trim_matches('/'));
        let api_root = base_url
            .join(&root_input)
            .map_err(|source| ClientError::InvalidUrl {
                url: root_input,
                source,
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| ClientError::Build { source })?;

        if credentials == Credentials::Anonymous {
            warn!(base_url = %base_url, "no authentication configured; requests are unauthenticated");
        }

        Ok(Self {
            client,
            base_url,
            api_root,
            credentials,
            token: OnceCell::new(),
        })
    }

    /// Build a client from a validated connection profile.
    ///
    /// # Errors
    ///
    /// See [`HttpRemoteClient::new`] and [`Credentials::from_profile`].
    pub fn from_profile(profile: &ConnectionProfile) -> ClientResult<Self> {
        let credentials = Credentials::from_profile(profile)?;
        Self::new(
            &profile.base_url(),
            &profile.extra.api_version,
            credentials,
            profile.timeout(),
        )
    }

    /// Versioned REST root every endpoint is joined to.
    #[must_use]
    pub const fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn endpoint_url(&self, endpoint: &str) -> ClientResult<Url> {
        self.api_root
            .join(endpoint.trim_start_matches('/'))
            .map_err(|source| ClientError::InvalidUrl {
                url: endpoint.to_string(),
                source,
            })
    }

    async fn authorization(&self) -> ClientResult<Option<String>> {
        match &self.credentials {
            Credentials::Anonymous => Ok(None),
            Credentials::Pat(pat) => Ok(Some(pat.clone())),
            Credentials::AuthToken { username, password } => {
                let token = self
                    .token
                    .get_or_try_init(|| self.login(username, password))
                    .await?;
                Ok(Some(token.clone()))
            }
        }
    }

    async fn login(&self, username: &str, password: &str) -> ClientResult<String> {
        let url = self
            .base_url
            .join(LOGIN_ENDPOINT)
            .map_err(|source| ClientError::InvalidUrl {
                url: LOGIN_ENDPOINT.to_string(),
                source,
            })?;
        debug!(url = %url, "requesting session token");
        let response = self
            .client
            .post(url.clone())
            .json(&json!({"userName": username, "password": password}))
            .send()
            .await
            .map_err(|source| ClientError::Http {
                method: "POST",
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Auth {
                reason: format!("login returned status {}", status.as_u16()),
            });
        }
        let body: LoginResponse = response.json().await.map_err(|source| ClientError::Http {
            method: "POST",
            url: url.to_string(),
            source,
        })?;
        body.token
            .filter(|token| !token.is_empty())
            .map(|token| format!("_dremio{token}"))
            .ok_or_else(|| ClientError::Auth {
                reason: "login response did not contain a token".to_string(),
            })
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn send(&self, request: ApiRequest) -> ClientResult<Option<Value>> {
        let url = self.endpoint_url(&request.endpoint)?;
        let method = request.method.as_str();
        let mut builder = self
            .client
            .request(reqwest_method(request.method), url.clone());
        if let Some(token) = self.authorization().await? {
            builder = builder.header(AUTHORIZATION, token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method, url = %url, "sending request");
        let response = builder.send().await.map_err(|source| ClientError::Http {
            method,
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(|source| ClientError::Http {
            method,
            url: url.to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ClientError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use dremio_config::{AuthMethod, ConnectionExtra};
    use httpmock::prelude::*;

    fn profile(server: &MockServer, auth: Option<AuthMethod>) -> ConnectionProfile {
        ConnectionProfile {
            conn_id: "dremio_default".into(),
            host: Some(server.base_url()),
            port: None,
            schema: None,
            login: Some("username".into()),
            password: Some("pass".into()),
            extra: ConnectionExtra {
                auth,
                pat: Some("pat-token".into()),
                ..ConnectionExtra::default()
            },
        }
    }

    #[tokio::test]
    async fn auth_token_is_fetched_once_and_reused() -> Result<()> {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/apiv2/login")
                .json_body(json!({"userName": "username", "password": "pass"}));
            then.status(200).json_body(json!({"token": "abc"}));
        });
        let catalog = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/catalog/ds-1")
                .header("authorization", "_dremioabc")
                .header("user-agent", USER_AGENT_VALUE);
            then.status(200).json_body(json!({"id": "ds-1"}));
        });

        let client = HttpRemoteClient::from_profile(&profile(&server, Some(AuthMethod::AuthToken)))?;
        let first = client.send(ApiRequest::get("/catalog/ds-1")).await?;
        let second = client.send(ApiRequest::get("catalog/ds-1")).await?;

        assert_eq!(first, Some(json!({"id": "ds-1"})));
        assert_eq!(first, second);
        login.assert_calls(1);
        catalog.assert_calls(2);
        Ok(())
    }

    #[tokio::test]
    async fn pat_is_sent_verbatim_with_json_body() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v3/sql")
                .header("authorization", "pat-token")
                .header("content-type", "application/json")
                .json_body(json!({"sql": "SELECT 1"}));
            then.status(200).json_body(json!({"id": "job-1"}));
        });

        let client = HttpRemoteClient::from_profile(&profile(&server, Some(AuthMethod::Pat)))?;
        let response = client
            .send(ApiRequest::post("sql", json!({"sql": "SELECT 1"})))
            .await?;
        assert_eq!(response, Some(json!({"id": "job-1"})));
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn no_content_yields_no_body() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v3/catalog/ds-1/refresh");
            then.status(204);
        });

        let client = HttpRemoteClient::from_profile(&profile(&server, None))?;
        let response = client
            .send(ApiRequest::post("catalog/ds-1/refresh", json!({})))
            .await?;
        assert!(response.is_none());
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/catalog/by-path/missing");
            then.status(404).body("not found");
        });

        let client = HttpRemoteClient::from_profile(&profile(&server, None))?;
        let err = client
            .send(ApiRequest::get("catalog/by-path/missing"))
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected an error"))?;
        assert!(err.is_not_found());
        assert!(matches!(err, ClientError::Status { ref body, .. } if body == "not found"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_login_surfaces_auth_error() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/apiv2/login");
            then.status(401);
        });

        let client = HttpRemoteClient::from_profile(&profile(&server, Some(AuthMethod::AuthToken)))?;
        let result = client.send(ApiRequest::get("catalog")).await;
        assert!(matches!(result, Err(ClientError::Auth { .. })));
        Ok(())
    }

    #[test]
    fn custom_api_root_is_respected() -> Result<()> {
        let client = HttpRemoteClient::new(
            "http://dremio.example:9047/",
            "/api/v4/",
            Credentials::Anonymous,
            Duration::from_secs(5),
        )?;
        assert_eq!(client.api_root().as_str(), "http://dremio.example:9047/api/v4/");
        Ok(())
    }
}
