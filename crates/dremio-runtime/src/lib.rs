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

//! Reflection reconciliation, completion tracking and the task entry points a
//! host scheduler invokes.
//!
//! Layout: `reconcile.rs` (create/update/refresh state machine), `tracker.rs`
//! (blocking and suspend/resume polling), `task.rs` (entry points and
//! connection handling), `error.rs`.

pub mod error;
pub mod reconcile;
pub mod task;
pub mod tracker;

pub use error::{RuntimeError, RuntimeResult};
pub use reconcile::{
    ReconcileAction, ReconcileOutcome, ReconcilePhase, ReconcileRequest, ReconciliationEngine,
};
pub use task::{
    Completion, ConnectionProvider, CreateSourceTask, JobSensor, MIN_POLL_INTERVAL,
    ProfileConnectionProvider, ReflectionTask, TaskContext, TaskOutcome, resume_deferred,
};
pub use tracker::{
    CompletionTracker, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, Resumption, resume_once,
    run_deferred,
};
