//! Span helpers for reflection tasks.
//!
//! # Design
//! - Each task execution runs inside one `reflection_task` span tagged with the
//!   task kind, its identifier and the build SHA.
//! - The span declares an empty `phase` field that reconciliation fills in as
//!   it moves between steps.

use tracing::Span;
use tracing::field::{Empty, display};

use crate::init::build_sha;

/// Span wrapping one execution of a task of `kind` identified by `task_id`.
#[must_use]
pub fn task_span(kind: &str, task_id: &str) -> Span {
    tracing::info_span!(
        "reflection_task",
        kind,
        task_id,
        build_sha = build_sha(),
        phase = Empty
    )
}

/// Record the current reconciliation phase on the active task span.
pub fn record_task_phase(phase: &str) {
    Span::current().record("phase", display(phase));
}
