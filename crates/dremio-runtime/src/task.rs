//! Entry points invoked by a host scheduler.
//!
//! # Design
//! - Each task owns its arguments and builds its own API handle from a
//!   connection reference; nothing is shared between executions.
//! - A deferrable reflection task returns a [`PollSession`] instead of
//!   blocking; the host parks it and later calls [`resume_deferred`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dremio_client::{DremioApi, HttpRemoteClient, RemoteClient};
use dremio_config::{ConnectionLoader, DEFAULT_CONNECTION_ID};
use dremio_core::{
    Clock, JobStatus, PollSession, ReflectionError, ReflectionSpec, RefreshPolicy,
    StatusTaxonomy, SystemClock, TerminalStatus, TrackerEvent,
};
use dremio_telemetry::{LoggingConfig, Metrics, init_logging, task_span};
use serde_json::{Map, Value};
use tracing::{Instrument, debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::reconcile::{ReconcileAction, ReconcileRequest, ReconciliationEngine};
use crate::tracker::{
    CompletionTracker, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, error_chain, run_deferred,
};

/// Shortest accepted interval between status polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Turns a connection reference into a transport.
pub trait ConnectionProvider: Send + Sync {
    /// Transport for `conn_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] or [`RuntimeError::Client`] when the
    /// reference cannot be resolved or the client cannot be built.
    fn client(&self, conn_id: &str) -> RuntimeResult<Arc<dyn RemoteClient>>;
}

impl<F> ConnectionProvider for F
where
    F: Fn(&str) -> RuntimeResult<Arc<dyn RemoteClient>> + Send + Sync,
{
    fn client(&self, conn_id: &str) -> RuntimeResult<Arc<dyn RemoteClient>> {
        self(conn_id)
    }
}

/// Provider backed by stored connection profiles and the HTTP client.
#[derive(Debug, Clone, Default)]
pub struct ProfileConnectionProvider {
    loader: ConnectionLoader,
}

impl ProfileConnectionProvider {
    /// Provider resolving references through `loader`.
    #[must_use]
    pub const fn new(loader: ConnectionLoader) -> Self {
        Self { loader }
    }
}

impl ConnectionProvider for ProfileConnectionProvider {
    fn client(&self, conn_id: &str) -> RuntimeResult<Arc<dyn RemoteClient>> {
        let profile = self
            .loader
            .load(conn_id)
            .map_err(|source| RuntimeError::Config {
                operation: "connection.load",
                source,
            })?;
        let client =
            HttpRemoteClient::from_profile(&profile).map_err(|source| RuntimeError::Client {
                operation: "connection.client",
                source,
            })?;
        Ok(Arc::new(client))
    }
}

/// Services shared by every task run in a host process.
#[derive(Clone)]
pub struct TaskContext {
    provider: Arc<dyn ConnectionProvider>,
    metrics: Option<Metrics>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    /// Context resolving connections through `provider`, using the system clock.
    #[must_use]
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            metrics: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Context reading connection profiles from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Arc::new(ProfileConnectionProvider::new(
            ConnectionLoader::from_env(),
        )))
    }

    /// Context for a host process: installs logging from the environment and
    /// reads connection profiles from it.
    ///
    /// An already installed subscriber is kept.
    #[must_use]
    pub fn bootstrap() -> Self {
        if let Err(err) = init_logging(&LoggingConfig::from_env()) {
            debug!(error = %err, "keeping existing tracing subscriber");
        }
        Self::from_env()
    }

    /// Count calls, polls and outcomes in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the wall clock used for deadlines.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// API handle for `conn_id`.
    ///
    /// # Errors
    ///
    /// See [`ConnectionProvider::client`].
    pub fn api(&self, conn_id: &str) -> RuntimeResult<DremioApi> {
        let api = DremioApi::new(self.provider.client(conn_id)?);
        Ok(match &self.metrics {
            Some(metrics) => api.with_metrics(metrics.clone()),
            None => api,
        })
    }

    /// Current time according to the configured clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// How completion was handled by a reflection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The caller did not ask to wait.
    NotAwaited,
    /// The refresh finished successfully while the task blocked.
    Succeeded,
    /// Tracking continues in the returned session.
    Deferred(PollSession),
}

/// Result of a reflection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Created, updated or refreshed reflection.
    pub reflection_id: String,
    /// Dataset the reflection belongs to.
    pub dataset_id: String,
    /// What reconciliation did.
    pub action: ReconcileAction,
    /// Completion handling.
    pub completion: Completion,
}

/// Reconcile one reflection and optionally wait for its refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionTask {
    /// Dot-delimited source path.
    pub source: String,
    /// Desired reflection definition.
    pub spec: ReflectionSpec,
    /// Connection reference.
    pub connection_id: String,
    /// Replace display fields with every dataset column.
    pub auto_inference: bool,
    /// Wait for the refresh to finish.
    pub wait_for_completion: bool,
    /// Return a poll session instead of blocking.
    pub deferrable: bool,
    /// Interval between status polls.
    pub poll_interval: Duration,
    /// Overall tracking timeout.
    pub timeout: Duration,
    /// SQL text for virtual datasets.
    pub sql: Option<String>,
    /// Execution queue.
    pub queue: Option<String>,
    /// Dataset refresh policy.
    pub refresh_policy: Option<RefreshPolicy>,
}

impl ReflectionTask {
    /// Task with default connection, interval and timeout that waits in blocking mode.
    #[must_use]
    pub fn new(source: impl Into<String>, spec: ReflectionSpec) -> Self {
        Self {
            source: source.into(),
            spec,
            connection_id: DEFAULT_CONNECTION_ID.to_string(),
            auto_inference: false,
            wait_for_completion: true,
            deferrable: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            sql: None,
            queue: None,
            refresh_policy: None,
        }
    }

    /// Use `connection_id` instead of the default reference.
    #[must_use]
    pub fn with_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = connection_id.into();
        self
    }

    /// Set the auto-inference flag.
    #[must_use]
    pub const fn with_auto_inference(mut self, enabled: bool) -> Self {
        self.auto_inference = enabled;
        self
    }

    /// Set whether to wait for the refresh.
    #[must_use]
    pub const fn with_wait(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    /// Track completion through a suspended session.
    #[must_use]
    pub const fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = deferrable;
        self
    }

    /// Poll interval and overall timeout.
    #[must_use]
    pub const fn with_polling(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }

    /// Attach SQL text.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach an execution queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Attach a refresh policy.
    #[must_use]
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    fn request(&self) -> ReconcileRequest {
        ReconcileRequest {
            source: self.source.clone(),
            spec: self.spec.clone(),
            auto_inference: self.auto_inference,
            sql: self.sql.clone(),
            refresh_policy: self.refresh_policy.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Reconcile the reflection, then handle completion as configured.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Reflection`] for validation, lookup, remote,
    /// timeout and refresh failures, and connection errors from the context.
    pub async fn execute(&self, ctx: &TaskContext) -> RuntimeResult<TaskOutcome> {
        self.run(ctx)
            .instrument(task_span("reflection", &self.source))
            .await
    }

    async fn run(&self, ctx: &TaskContext) -> RuntimeResult<TaskOutcome> {
        if self.wait_for_completion && self.poll_interval < MIN_POLL_INTERVAL {
            return Err(RuntimeError::reflection(
                "reflection.task",
                ReflectionError::validation("poll_interval", "must be at least one second"),
            ));
        }

        let api = ctx.api(&self.connection_id)?;
        let outcome = ReconciliationEngine::new(api.clone())
            .reconcile(&self.request())
            .await
            .map_err(|err| RuntimeError::reflection("reflection.reconcile", err))?;

        let completion = if !self.wait_for_completion {
            warn!(
                reflection_id = %outcome.reflection_id,
                "not waiting for the refresh; it continues on the remote system"
            );
            Completion::NotAwaited
        } else if self.deferrable {
            let session = PollSession::start(
                outcome.reflection_id.clone(),
                self.connection_id.clone(),
                ctx.now(),
                self.timeout,
                self.poll_interval,
            );
            info!(
                reflection_id = %session.reflection_id,
                deadline = %session.deadline,
                "deferring completion tracking"
            );
            Completion::Deferred(session)
        } else {
            let status = CompletionTracker::new(api)
                .wait_for_status(&outcome.reflection_id, self.poll_interval, self.timeout)
                .await
                .map_err(|err| RuntimeError::reflection("reflection.wait", err))?;
            if !status.is_success() {
                return Err(RuntimeError::reflection(
                    "reflection.wait",
                    ReflectionError::RemoteJobFailed {
                        id: outcome.reflection_id,
                        state: status.to_string(),
                        message: None,
                    },
                ));
            }
            Completion::Succeeded
        };

        Ok(TaskOutcome {
            reflection_id: outcome.reflection_id,
            dataset_id: outcome.dataset_id,
            action: outcome.action,
            completion,
        })
    }

    /// Map the terminal event of a deferred session to the task result.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteJobFailed`] for `disabled` and `error`
    /// events.
    pub fn complete(event: &TrackerEvent) -> RuntimeResult<String> {
        match event.status {
            TerminalStatus::Success => {
                info!(reflection_id = %event.reflection_id, "{}", event.message);
                Ok(event.reflection_id.clone())
            }
            TerminalStatus::Disabled | TerminalStatus::Error => Err(RuntimeError::reflection(
                "reflection.complete",
                ReflectionError::RemoteJobFailed {
                    id: event.reflection_id.clone(),
                    state: event.status.as_str().to_string(),
                    message: Some(event.message.clone()),
                },
            )),
        }
    }
}

/// Rebuild the client from the session's connection reference and drive the
/// session to its terminal event.
pub async fn resume_deferred(ctx: &TaskContext, session: PollSession) -> TrackerEvent {
    let api = match ctx.api(&session.connection_id) {
        Ok(api) => api,
        Err(err) => {
            let detail = error_chain(&err);
            warn!(reflection_id = %session.reflection_id, error = %detail, "could not reconnect");
            return TrackerEvent::poll_failed(&session.reflection_id, &detail);
        }
    };
    let span = task_span("reflection-tracker", &session.reflection_id);
    run_deferred(&api, session, ctx.clock.as_ref())
        .instrument(span)
        .await
}

/// Create a catalog source from a caller-supplied specification.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSourceTask {
    /// Source body; `entityType` is forced to `source`.
    pub source_spec: Map<String, Value>,
    /// Connection reference.
    pub connection_id: String,
}

impl CreateSourceTask {
    /// Task using the default connection.
    #[must_use]
    pub fn new(source_spec: Map<String, Value>) -> Self {
        Self {
            source_spec,
            connection_id: DEFAULT_CONNECTION_ID.to_string(),
        }
    }

    /// Use `connection_id` instead of the default reference.
    #[must_use]
    pub fn with_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = connection_id.into();
        self
    }

    /// Post the source to the catalog and return the response body.
    ///
    /// # Errors
    ///
    /// Returns connection errors and [`RuntimeError::Reflection`] for remote failures.
    pub async fn execute(&self, ctx: &TaskContext) -> RuntimeResult<Option<Value>> {
        let api = ctx.api(&self.connection_id)?;
        let mut body = self.source_spec.clone();
        body.insert("entityType".to_string(), Value::String("source".to_string()));
        info!(name = body.get("name").and_then(serde_json::Value::as_str), "creating catalog source");
        api.create_catalog_entity(Value::Object(body))
            .await
            .map_err(|err| RuntimeError::reflection("source.create", err))
    }
}

/// Checks a remote job for completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSensor {
    /// Job identifier.
    pub job_id: String,
    /// Connection reference.
    pub connection_id: String,
}

impl JobSensor {
    /// Sensor using the default connection.
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            connection_id: DEFAULT_CONNECTION_ID.to_string(),
        }
    }

    /// Use `connection_id` instead of the default reference.
    #[must_use]
    pub fn with_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = connection_id.into();
        self
    }

    /// `true` once the job succeeded, `false` while it is still running.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteJobFailed`] carrying the remote error
    /// message when the job failed, and [`ReflectionError::InvalidStatus`]
    /// for unknown states.
    pub async fn poke(&self, ctx: &TaskContext) -> RuntimeResult<bool> {
        let api = ctx.api(&self.connection_id)?;
        let (status, job) = api
            .job_status(&self.job_id)
            .await
            .map_err(|err| RuntimeError::reflection("job.poke", err))?;
        info!(job_id = %self.job_id, %status, "job status");
        if status.is_failure() {
            return Err(RuntimeError::reflection(
                "job.poke",
                ReflectionError::RemoteJobFailed {
                    id: self.job_id.clone(),
                    state: status.to_string(),
                    message: job
                        .get("errorMessage")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                },
            ));
        }
        Ok(status == JobStatus::Completed)
    }

    /// Results of the job.
    ///
    /// # Errors
    ///
    /// Returns connection errors and [`RuntimeError::Reflection`] for remote failures.
    pub async fn results(&self, ctx: &TaskContext) -> RuntimeResult<Value> {
        ctx.api(&self.connection_id)?
            .job_results(&self.job_id)
            .await
            .map_err(|err| RuntimeError::reflection("job.results", err))
    }
}
