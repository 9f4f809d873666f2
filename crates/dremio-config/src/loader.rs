//! Connection lookup by reference.
//!
//! # Design
//! - A profile for `conn_id` is read from `DREMIO_CONN_<ID>` first, then from
//!   the JSON map stored at `DREMIO_CONNECTIONS_FILE`.
//! - Environment access goes through a lookup closure so callers and tests
//!   can supply their own source without touching process state.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ConnectionProfile;
use crate::validate::parse_profile;

/// Prefix of per-connection environment variables.
pub const CONNECTION_ENV_PREFIX: &str = "DREMIO_CONN_";
/// Environment variable naming a JSON file of connection documents.
pub const CONNECTIONS_FILE_ENV: &str = "DREMIO_CONNECTIONS_FILE";
/// Connection reference used when a task does not name one.
pub const DEFAULT_CONNECTION_ID: &str = "dremio_default";

/// Environment variable that holds the document for `conn_id`.
///
/// The reference is upper-cased and every non-alphanumeric character becomes `_`.
#[must_use]
pub fn env_var_name(conn_id: &str) -> String {
    let suffix: String = conn_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{CONNECTION_ENV_PREFIX}{suffix}")
}

/// Resolves connection references to validated profiles.
#[derive(Debug, Clone, Default)]
pub struct ConnectionLoader {
    file: Option<PathBuf>,
}

impl ConnectionLoader {
    /// Loader that consults the process environment for the connections file.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            file: std::env::var_os(CONNECTIONS_FILE_ENV).map(PathBuf::from),
        }
    }

    /// Loader backed by an explicit connections file.
    #[must_use]
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
        }
    }

    /// Connections file consulted after the environment.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Load `conn_id` using the process environment.
    ///
    /// # Errors
    ///
    /// See [`ConnectionLoader::load_with`].
    pub fn load(&self, conn_id: &str) -> ConfigResult<ConnectionProfile> {
        self.load_with(conn_id, |name| std::env::var(name).ok())
    }

    /// Load `conn_id` using `lookup` in place of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingConnection`] when no source defines the
    /// reference, [`ConfigError::Io`] when the file cannot be read, and parse
    /// or validation errors from the document itself.
    pub fn load_with<F>(&self, conn_id: &str, lookup: F) -> ConfigResult<ConnectionProfile>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = env_var_name(conn_id);
        if let Some(raw) = lookup(&var) {
            debug!(conn_id, source = %var, "loading connection from environment");
            let document = parse_document(conn_id, &raw)?;
            return parse_profile(conn_id, &document);
        }

        if let Some(path) = &self.file {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                operation: "connections.read",
                path: path.clone(),
                source,
            })?;
            let mut connections = parse_document(conn_id, &raw)?;
            if let Some(document) = connections.get_mut(conn_id).map(Value::take) {
                debug!(conn_id, path = %path.display(), "loading connection from file");
                return parse_profile(conn_id, &document);
            }
        }

        Err(ConfigError::MissingConnection {
            conn_id: conn_id.to_string(),
        })
    }
}

fn parse_document(conn_id: &str, raw: &str) -> ConfigResult<Value> {
    serde_json::from_str(raw).map_err(|source| ConfigError::InvalidDocument {
        conn_id: conn_id.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_var_name_normalizes_reference() {
        assert_eq!(env_var_name("dremio_default"), "DREMIO_CONN_DREMIO_DEFAULT");
        assert_eq!(env_var_name("prod-lake.1"), "DREMIO_CONN_PROD_LAKE_1");
    }

    #[test]
    fn environment_takes_precedence() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"dremio_default": {{"host": "from-file"}}}}"#)?;
        let loader = ConnectionLoader::with_file(file.path());

        let profile = loader.load_with(
            "dremio_default",
            lookup(&[("DREMIO_CONN_DREMIO_DEFAULT", r#"{"host": "from-env"}"#)]),
        )?;
        assert_eq!(profile.host.as_deref(), Some("from-env"));
        assert_eq!(profile.conn_id, "dremio_default");
        Ok(())
    }

    #[test]
    fn falls_back_to_connections_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"lake": {{"host": "test", "port": 9047, "extra": {{"auth": "PAT", "pat": "tok"}}}}}}"#
        )?;
        let loader = ConnectionLoader::with_file(file.path());
        let profile = loader.load_with("lake", lookup(&[]))?;
        assert_eq!(profile.base_url(), "http://test:9047");
        assert_eq!(profile.extra.pat.as_deref(), Some("tok"));
        Ok(())
    }

    #[test]
    fn missing_connection_is_reported() {
        let loader = ConnectionLoader::default();
        let result = loader.load_with("absent", lookup(&[]));
        assert!(matches!(
            result,
            Err(ConfigError::MissingConnection { conn_id }) if conn_id == "absent"
        ));
    }

    #[test]
    fn unreadable_file_surfaces_io_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let loader = ConnectionLoader::with_file(dir.path().join("missing.json"));
        let result = loader.load_with("lake", lookup(&[]));
        assert!(matches!(
            result,
            Err(ConfigError::Io { operation: "connections.read", .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_env_document_is_rejected() {
        let loader = ConnectionLoader::default();
        let result = loader.load_with("lake", lookup(&[("DREMIO_CONN_LAKE", "{not json")]));
        assert!(matches!(result, Err(ConfigError::InvalidDocument { .. })));
    }
}
