//! Typed connection profile.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// REST root used when the profile does not override it.
pub const DEFAULT_API_VERSION: &str = "api/v3";
/// HTTP timeout used when the profile does not override it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How requests authenticate against the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    /// Exchange login/password for a session token.
    #[serde(rename = "AuthToken")]
    AuthToken,
    /// Personal access token sent verbatim.
    #[serde(rename = "PAT")]
    Pat,
}

impl AuthMethod {
    /// Wire name used in profile documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthToken => "AuthToken",
            Self::Pat => "PAT",
        }
    }
}

/// Optional knobs stored alongside the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionExtra {
    /// Authentication method; `None` sends unauthenticated requests.
    pub auth: Option<AuthMethod>,
    /// Personal access token used with [`AuthMethod::Pat`].
    pub pat: Option<String>,
    /// Versioned REST root relative to the base URL.
    pub api_version: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConnectionExtra {
    fn default() -> Self {
        Self {
            auth: None,
            pat: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Resolved connection profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Connection reference the profile was loaded for.
    pub conn_id: String,
    /// Host name, optionally including the scheme.
    pub host: Option<String>,
    /// TCP port.
    pub port: Option<u16>,
    /// URL scheme used when `host` carries none.
    pub schema: Option<String>,
    /// Login used by token authentication.
    pub login: Option<String>,
    /// Password used by token authentication.
    pub password: Option<String>,
    /// Optional knobs.
    pub extra: ConnectionExtra,
}

impl ConnectionProfile {
    /// Base URL of the remote service (scheme, host and port only).
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.as_deref().unwrap_or_default();
        let mut base = if host.contains("://") {
            host.to_string()
        } else {
            let schema = self
                .schema
                .as_deref()
                .filter(|schema| !schema.is_empty())
                .unwrap_or("http");
            format!("{schema}://{host}")
        };
        if let Some(port) = self.port {
            // Writing into a `String` cannot fail.
            let _ = write!(base, ":{port}");
        }
        base
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.extra.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(host: &str, port: Option<u16>, schema: Option<&str>) -> ConnectionProfile {
        ConnectionProfile {
            conn_id: "dremio_default".into(),
            host: Some(host.into()),
            port,
            schema: schema.map(str::to_string),
            login: None,
            password: None,
            extra: ConnectionExtra::default(),
        }
    }

    #[test]
    fn base_url_defaults_to_http() {
        assert_eq!(profile("test:9047", None, None).base_url(), "http://test:9047");
    }

    #[test]
    fn base_url_appends_port_and_schema() {
        assert_eq!(
            profile("test", Some(9047), Some("https")).base_url(),
            "https://test:9047"
        );
    }

    #[test]
    fn base_url_keeps_explicit_scheme() {
        assert_eq!(
            profile("https://dremio.example", None, Some("http")).base_url(),
            "https://dremio.example"
        );
    }

    #[test]
    fn defaults_apply_to_extra() {
        let extra = ConnectionExtra::default();
        assert_eq!(extra.api_version, DEFAULT_API_VERSION);
        assert_eq!(extra.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(AuthMethod::Pat.as_str(), "PAT");
    }
}
