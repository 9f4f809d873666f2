//! Capture of values recorded into span `phase` fields.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing::span::{Id, Record};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Layer remembering every `phase` value recorded after span creation.
#[derive(Debug, Clone, Default)]
pub struct PhaseRecorder {
    phases: Arc<Mutex<Vec<String>>>,
}

impl PhaseRecorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make this recorder the subscriber of the current thread until the guard drops.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        tracing_subscriber::registry()
            .with(self.clone())
            .set_default()
    }

    /// Phases in the order they were recorded.
    #[must_use]
    pub fn phases(&self) -> Vec<String> {
        lock(&self.phases).clone()
    }
}

impl<S: Subscriber> Layer<S> for PhaseRecorder {
    fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        values.record(&mut PhaseVisitor(&self.phases));
    }
}

struct PhaseVisitor<'a>(&'a Mutex<Vec<String>>);

impl Visit for PhaseVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "phase" {
            lock(self.0).push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "phase" {
            lock(self.0).push(format!("{value:?}"));
        }
    }
}

fn lock(phases: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    phases.lock().unwrap_or_else(PoisonError::into_inner)
}
