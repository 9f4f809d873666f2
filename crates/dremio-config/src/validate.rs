//! Validation helpers and parsing utilities for connection documents.

use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AuthMethod, ConnectionExtra, ConnectionProfile};

/// Parse and validate a connection document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when a member has the wrong shape or
/// the authentication settings are incomplete.
pub fn parse_profile(conn_id: &str, document: &Value) -> ConfigResult<ConnectionProfile> {
    let map = document
        .as_object()
        .ok_or_else(|| invalid(conn_id, "connection", None, "must be an object"))?;

    let profile = ConnectionProfile {
        conn_id: conn_id.to_string(),
        host: optional_string(conn_id, map, "host")?,
        port: parse_port(conn_id, map.get("port"))?,
        schema: optional_string(conn_id, map, "schema")?,
        login: optional_string(conn_id, map, "login")?,
        password: optional_string(conn_id, map, "password")?,
        extra: parse_extra(conn_id, map.get("extra"))?,
    };
    validate_auth(&profile)?;
    Ok(profile)
}

/// Check that the configured authentication method has the material it needs.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when credentials are missing.
pub fn validate_auth(profile: &ConnectionProfile) -> ConfigResult<()> {
    match profile.extra.auth {
        Some(AuthMethod::AuthToken) => {
            let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
            if !present(&profile.login) || !present(&profile.password) {
                return Err(invalid(
                    &profile.conn_id,
                    "login",
                    None,
                    "login and password are required for AuthToken",
                ));
            }
        }
        Some(AuthMethod::Pat) => {
            if profile.extra.pat.as_deref().is_none_or(str::is_empty) {
                return Err(invalid(
                    &profile.conn_id,
                    "extra.pat",
                    None,
                    "is required for PAT authentication",
                ));
            }
        }
        None => {}
    }
    Ok(())
}

fn parse_extra(conn_id: &str, value: Option<&Value>) -> ConfigResult<ConnectionExtra> {
    let parsed;
    let map = match value {
        None | Some(Value::Null) => return Ok(ConnectionExtra::default()),
        Some(Value::String(raw)) if raw.trim().is_empty() => {
            return Ok(ConnectionExtra::default());
        }
        Some(Value::String(raw)) => {
            parsed = serde_json::from_str::<Value>(raw).map_err(|source| {
                ConfigError::InvalidDocument {
                    conn_id: conn_id.to_string(),
                    source,
                }
            })?;
            parsed
                .as_object()
                .ok_or_else(|| invalid(conn_id, "extra", None, "must be an object"))?
        }
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid(conn_id, "extra", None, "must be an object")),
    };

    let mut extra = ConnectionExtra::default();
    extra.auth = match optional_string(conn_id, map, "auth")?.as_deref() {
        None | Some("") => None,
        Some("AuthToken") => Some(AuthMethod::AuthToken),
        Some("PAT") => Some(AuthMethod::Pat),
        Some(other) => {
            return Err(invalid(
                conn_id,
                "extra.auth",
                Some(other.to_string()),
                "must be either 'AuthToken' or 'PAT'",
            ));
        }
    };
    extra.pat = optional_string(conn_id, map, "pat")?;
    if let Some(api_version) = optional_string(conn_id, map, "api_version")? {
        let trimmed = api_version.trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(conn_id, "extra.api_version", None, "must not be empty"));
        }
        extra.api_version = trimmed.to_string();
    }
    if let Some(timeout) = map.get("timeout_secs").filter(|value| !value.is_null()) {
        extra.timeout_secs = timeout
            .as_u64()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                invalid(
                    conn_id,
                    "extra.timeout_secs",
                    Some(timeout.to_string()),
                    "must be a positive integer",
                )
            })?;
    }
    Ok(extra)
}

fn parse_port(conn_id: &str, value: Option<&Value>) -> ConfigResult<Option<u16>> {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    let port = value
        .as_i64()
        .ok_or_else(|| invalid(conn_id, "port", Some(value.to_string()), "must be an integer"))?;
    if !(1..=65_535).contains(&port) {
        return Err(invalid(
            conn_id,
            "port",
            Some(port.to_string()),
            "must be between 1 and 65535",
        ));
    }
    u16::try_from(port).map(Some).map_err(|_| {
        invalid(
            conn_id,
            "port",
            Some(port.to_string()),
            "must be between 1 and 65535",
        )
    })
}

fn optional_string(
    conn_id: &str,
    map: &Map<String, Value>,
    field: &'static str,
) -> ConfigResult<Option<String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(invalid(
            conn_id,
            field,
            Some(other.to_string()),
            "must be a string",
        )),
    }
}

fn invalid(
    conn_id: &str,
    field: &'static str,
    value: Option<String>,
    reason: &'static str,
) -> ConfigError {
    ConfigError::InvalidField {
        conn_id: conn_id.to_string(),
        field,
        value,
        reason,
    }
}
