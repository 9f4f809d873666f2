//! Credential material derived from a connection profile.

use std::fmt;

use dremio_config::{AuthMethod, ConnectionProfile};

use crate::error::{ClientError, ClientResult};

/// How the client authorizes requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No `Authorization` header.
    Anonymous,
    /// Exchange a login and password for a session token.
    AuthToken {
        /// Login name.
        username: String,
        /// Password.
        password: String,
    },
    /// Personal access token sent verbatim.
    Pat(String),
}

impl Credentials {
    /// Derive credentials from a validated profile.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] when the configured method lacks material.
    pub fn from_profile(profile: &ConnectionProfile) -> ClientResult<Self> {
        match profile.extra.auth {
            None => Ok(Self::Anonymous),
            Some(AuthMethod::AuthToken) => {
                match (profile.login.as_deref(), profile.password.as_deref()) {
                    (Some(username), Some(password))
                        if !username.is_empty() && !password.is_empty() =>
                    {
                        Ok(Self::AuthToken {
                            username: username.to_string(),
                            password: password.to_string(),
                        })
                    }
                    _ => Err(ClientError::Auth {
                        reason: format!(
                            "both login and password must be set in connection '{}'",
                            profile.conn_id
                        ),
                    }),
                }
            }
            Some(AuthMethod::Pat) => match profile.extra.pat.as_deref() {
                Some(pat) if !pat.is_empty() => Ok(Self::Pat(pat.to_string())),
                _ => Err(ClientError::Auth {
                    reason: format!("connection '{}' has no PAT configured", profile.conn_id),
                }),
            },
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::AuthToken { username, .. } => f
                .debug_struct("AuthToken")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Pat(_) => f.write_str("Pat(<redacted>)"),
        }
    }
}
