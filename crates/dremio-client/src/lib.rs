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

//! Remote access to the analytics service's REST API.
//!
//! Layout: `remote.rs` (transport trait), `http.rs` (reqwest transport),
//! `auth.rs` (credentials), `api.rs` (typed endpoints), `catalog.rs`
//! (dataset resolution), `error.rs`.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod http;
pub mod remote;

pub use api::{DremioApi, PropertyLevel};
pub use auth::Credentials;
pub use catalog::{CatalogResolver, catalog_path};
pub use error::{ClientError, ClientResult};
pub use http::{HttpRemoteClient, USER_AGENT_VALUE};
pub use remote::{ApiRequest, Method, RemoteClient};
