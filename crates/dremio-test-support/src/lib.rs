#![forbid(unsafe_code)]
#![warn(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Shared test helpers used across suites.
//! Layout: mocks.rs (scripted remote client), fixtures.rs (catalog and
//! reflection payloads), clock.rs (clock following tokio's paused time),
//! phases.rs (span phase capture).

pub mod clock;
pub mod fixtures;
pub mod mocks;
pub mod phases;

pub use clock::AnchoredClock;
pub use mocks::{FakeRemoteClient, ScriptedResponse};
pub use phases::PhaseRecorder;
