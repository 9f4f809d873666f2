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

//! Telemetry primitives shared by the reflection tasks.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (task spans and
//! phase recording), `metrics.rs` (Prometheus registry).

pub mod context;
pub mod init;
pub mod metrics;

pub use context::{record_task_phase, task_span};
pub use init::{
    BUILD_SHA_ENV, DEFAULT_LOG_LEVEL, LOG_FORMAT_ENV, LOG_LEVEL_ENV, LogFormat, LoggingConfig,
    build_sha, init_logging,
};
pub use metrics::{Metrics, MetricsSnapshot};
