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

//! Transport-agnostic reflection domain: catalog and reflection models, status
//! taxonomies, specification diffing and the suspend/resume poll session.
//!
//! Layout: `model.rs` (wire DTOs), `status.rs` (status taxonomies),
//! `diff.rs` (desired vs. existing comparison), `session.rs` (poll session and
//! terminal events), `error.rs` (error taxonomy).

pub mod diff;
pub mod error;
pub mod model;
pub mod session;
pub mod status;

pub use diff::{
    COMPARISON_EXCLUDED_FIELDS, SpecDiff, UPDATE_EXCLUDED_FIELDS, diff, is_defined,
    merge_update, strip_fields,
};
pub use error::{ReflectionError, ReflectionResult};
pub use model::{
    Dataset, DatasetField, DatasetType, FieldRef, ReflectionRecord, ReflectionSpec,
    ReflectionType, RefreshMethod, RefreshPolicy, RefreshPolicyType,
};
pub use session::{
    Clock, NextAction, PollSession, SystemClock, TerminalStatus, TrackerEvent,
};
pub use status::{JobStatus, ReflectionRefreshStatus, StatusTaxonomy};
