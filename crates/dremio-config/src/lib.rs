#![forbid(unsafe_code)]
#![warn(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Connection profiles for the remote analytics service.
//!
//! Layout: `model.rs` (typed profile), `validate.rs` (JSON document parsing and
//! field checks), `loader.rs` (lookup by connection reference), `error.rs`.

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONNECTION_ENV_PREFIX, CONNECTIONS_FILE_ENV, ConnectionLoader, DEFAULT_CONNECTION_ID,
    env_var_name,
};
pub use model::{
    AuthMethod, ConnectionExtra, ConnectionProfile, DEFAULT_API_VERSION, DEFAULT_TIMEOUT_SECS,
};
