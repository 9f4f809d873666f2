//! Completion tracking for reflection refreshes.
//!
//! # Design
//! - Blocking mode holds the caller until a terminal status is seen. The
//!   deadline is checked before each sleep, so an overrun fails immediately.
//! - Suspend/resume mode is driven by [`resume_once`], which polls at most once
//!   and hands back either the session to park or the terminal event. Between
//!   polls nothing but the serializable [`PollSession`] is kept.
//! - Suspend/resume never propagates an error: failures become an `error`
//!   event so the caller always receives exactly one terminal signal.

use std::error::Error;
use std::iter;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dremio_client::DremioApi;
use dremio_core::{
    Clock, NextAction, PollSession, ReflectionError, ReflectionRefreshStatus, ReflectionResult,
    StatusTaxonomy, TrackerEvent,
};
use dremio_telemetry::Metrics;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// Interval between status polls when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Overall tracking timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Keeps the active-tracker gauge accurate however a session ends.
struct ActiveTracker(Option<Metrics>);

impl ActiveTracker {
    fn start(metrics: Option<&Metrics>) -> Self {
        if let Some(metrics) = metrics {
            metrics.tracker_started();
        }
        Self(metrics.cloned())
    }
}

impl Drop for ActiveTracker {
    fn drop(&mut self) {
        if let Some(metrics) = &self.0 {
            metrics.tracker_finished();
        }
    }
}

/// Blocking-mode tracker.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    api: DremioApi,
}

impl CompletionTracker {
    /// Tracker polling through `api`.
    #[must_use]
    pub const fn new(api: DremioApi) -> Self {
        Self { api }
    }

    /// Poll until the reflection reaches a terminal status and return it.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::Timeout`] when `timeout` elapses first and
    /// propagates any polling failure.
    pub async fn wait_for_status(
        &self,
        reflection_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> ReflectionResult<ReflectionRefreshStatus> {
        let _active = ActiveTracker::start(self.api.metrics());
        let started = Instant::now();
        let deadline = started.checked_add(timeout);

        let mut status = poll(&self.api, reflection_id).await?;
        while !status.is_terminal() {
            if deadline.is_some_and(|deadline| Instant::now() > deadline) {
                warn!(reflection_id, timeout_secs = timeout.as_secs(), "reflection refresh timed out");
                record(self.api.metrics(), "error");
                return Err(ReflectionError::Timeout {
                    reflection_id: reflection_id.to_string(),
                    timeout,
                });
            }
            info!(
                reflection_id,
                %status,
                wait_secs = poll_interval.as_secs(),
                "refresh still running"
            );
            sleep(poll_interval).await;
            status = poll(&self.api, reflection_id).await?;
        }

        let label = if status.is_success() {
            "success"
        } else if status == ReflectionRefreshStatus::Disabled {
            "disabled"
        } else {
            "error"
        };
        record(self.api.metrics(), label);
        info!(
            reflection_id,
            %status,
            elapsed_secs = started.elapsed().as_secs(),
            "reflection refresh reached a terminal status"
        );
        Ok(status)
    }

    /// `true` when the refresh ends in a success state, `false` on failure.
    ///
    /// # Errors
    ///
    /// See [`CompletionTracker::wait_for_status`].
    pub async fn wait_for_completion(
        &self,
        reflection_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> ReflectionResult<bool> {
        self.wait_for_status(reflection_id, poll_interval, timeout)
            .await
            .map(ReflectionRefreshStatus::is_success)
    }
}

/// Result of one suspend/resume step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resumption {
    /// Not terminal yet; park until `wake_at`, then resume `session`.
    Suspend {
        /// When to resume.
        wake_at: DateTime<Utc>,
        /// State to resume with.
        session: PollSession,
    },
    /// The session is over.
    Finished(TrackerEvent),
}

/// Perform one step of a suspended session woken at `now`.
///
/// The deadline is checked before polling. Polling errors are folded into an
/// `error` event carrying the full failure chain.
pub async fn resume_once(api: &DremioApi, session: PollSession, now: DateTime<Utc>) -> Resumption {
    if let NextAction::Emit(event) = session.next_action(now) {
        warn!(reflection_id = %session.reflection_id, deadline = %session.deadline, "tracking deadline passed");
        return Resumption::Finished(event);
    }
    match poll(api, &session.reflection_id).await {
        Ok(status) => match session.settle(status) {
            Some(event) => Resumption::Finished(event),
            None => {
                let wake_at = session.wake_at(now);
                info!(reflection_id = %session.reflection_id, %status, %wake_at, "suspending until next poll");
                Resumption::Suspend { wake_at, session }
            }
        },
        Err(err) => {
            let detail = error_chain(&err);
            warn!(reflection_id = %session.reflection_id, error = %detail, "status poll failed");
            Resumption::Finished(TrackerEvent::poll_failed(&session.reflection_id, &detail))
        }
    }
}

/// Drive `session` to its terminal event, parking on a timer between polls.
pub async fn run_deferred(api: &DremioApi, session: PollSession, clock: &dyn Clock) -> TrackerEvent {
    let _active = ActiveTracker::start(api.metrics());
    let mut session = session;
    loop {
        match resume_once(api, session, clock.now()).await {
            Resumption::Finished(event) => {
                record(api.metrics(), event.status.as_str());
                info!(
                    reflection_id = %event.reflection_id,
                    status = event.status.as_str(),
                    message = %event.message,
                    "tracking finished"
                );
                return event;
            }
            Resumption::Suspend {
                wake_at,
                session: next,
            } => {
                let wait = (wake_at - clock.now()).to_std().unwrap_or_default();
                sleep(wait).await;
                session = next;
            }
        }
    }
}

async fn poll(api: &DremioApi, reflection_id: &str) -> ReflectionResult<ReflectionRefreshStatus> {
    if let Some(metrics) = api.metrics() {
        metrics.inc_status_poll();
    }
    api.reflection_status(reflection_id).await
}

fn record(metrics: Option<&Metrics>, status: &str) {
    if let Some(metrics) = metrics {
        metrics.inc_tracker_event(status);
    }
}

/// `err` and each of its sources, joined with `: `.
pub(crate) fn error_chain(err: &(dyn Error + 'static)) -> String {
    iter::successors(Some(err), |&err| err.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeDelta;
    use dremio_client::{Method, RemoteClient};
    use dremio_core::TerminalStatus;
    use dremio_test_support::fixtures::reflection_status;
    use dremio_test_support::{AnchoredClock, FakeRemoteClient};
    use std::sync::Arc;

    const ENDPOINT: &str = "reflection/r-1";

    fn api(fake: &Arc<FakeRemoteClient>) -> DremioApi {
        let client: Arc<dyn RemoteClient> = fake.clone();
        DremioApi::new(client)
    }

    fn statuses(fake: &FakeRemoteClient, states: &[&str]) {
        fake.on_sequence(
            Method::Get,
            ENDPOINT,
            states.iter().map(|state| reflection_status("r-1", state)),
        );
    }

    fn anchor() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_mode_reports_failure_states_as_false() -> Result<()> {
        let fake = Arc::new(FakeRemoteClient::new());
        statuses(&fake, &["REFRESHING", "CANNOT_ACCELERATE_MANUAL"]);
        let metrics = Metrics::new()?;
        let tracker = CompletionTracker::new(api(&fake).with_metrics(metrics.clone()));

        let done = tracker
            .wait_for_completion("r-1", Duration::from_secs(5), DEFAULT_TIMEOUT)
            .await?;
        assert!(!done);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.status_polls_total, 2);
        assert_eq!(snapshot.tracker_error_total, 1);
        assert_eq!(snapshot.active_trackers, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_mode_propagates_invalid_statuses() {
        let fake = Arc::new(FakeRemoteClient::new());
        statuses(&fake, &["REFRESHING", "MELTING"]);
        let result = CompletionTracker::new(api(&fake))
            .wait_for_status("r-1", Duration::from_secs(5), DEFAULT_TIMEOUT)
            .await;
        assert!(matches!(result, Err(ReflectionError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn resume_past_deadline_emits_without_polling() {
        let fake = Arc::new(FakeRemoteClient::new());
        let session = PollSession::start("r-1", "conn", anchor(), Duration::from_secs(10), Duration::from_secs(5));

        let step = resume_once(&api(&fake), session, anchor() + TimeDelta::seconds(11)).await;
        let Resumption::Finished(event) = step else {
            panic!("expected a terminal event");
        };
        assert_eq!(event.status, TerminalStatus::Error);
        assert_eq!(fake.count(Method::Get, ENDPOINT), 0);
    }

    #[tokio::test]
    async fn resume_on_deadline_still_polls() {
        let fake = Arc::new(FakeRemoteClient::new());
        statuses(&fake, &["INCOMPLETE"]);
        let session = PollSession::start("r-1", "conn", anchor(), Duration::from_secs(10), Duration::from_secs(5));

        let now = anchor() + TimeDelta::seconds(10);
        let step = resume_once(&api(&fake), session.clone(), now).await;
        assert_eq!(
            step,
            Resumption::Suspend {
                wake_at: now + TimeDelta::seconds(5),
                session,
            }
        );
    }

    #[tokio::test]
    async fn poll_errors_become_error_events_with_detail() {
        let fake = Arc::new(FakeRemoteClient::new());
        fake.on_status(Method::Get, ENDPOINT, 500);
        let session = PollSession::start("r-1", "conn", anchor(), DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL);

        let step = resume_once(&api(&fake), session, anchor()).await;
        let Resumption::Finished(event) = step else {
            panic!("expected a terminal event");
        };
        assert_eq!(event.status, TerminalStatus::Error);
        assert!(event.message.contains("reflection.get"), "{}", event.message);
        assert!(event.message.contains("500"), "{}", event.message);
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_run_sleeps_between_polls() -> Result<()> {
        let fake = Arc::new(FakeRemoteClient::new());
        statuses(&fake, &["INCOMPLETE", "REFRESHING", "CAN_ACCELERATE"]);
        let clock = AnchoredClock::new(anchor());
        let metrics = Metrics::new()?;
        let session = PollSession::start("r-1", "conn", anchor(), DEFAULT_TIMEOUT, Duration::from_secs(30));

        let started = Instant::now();
        let event = run_deferred(&api(&fake).with_metrics(metrics.clone()), session, &clock).await;
        assert_eq!(event, TrackerEvent::success("r-1"));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(fake.count(Method::Get, ENDPOINT), 3);
        assert_eq!(metrics.snapshot().tracker_success_total, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_run_reports_disabled_reflections() {
        let fake = Arc::new(FakeRemoteClient::new());
        statuses(&fake, &["REFRESHING", "DISABLED"]);
        let clock = AnchoredClock::new(anchor());
        let session = PollSession::start("r-1", "conn", anchor(), DEFAULT_TIMEOUT, Duration::from_secs(5));

        let event = run_deferred(&api(&fake), session, &clock).await;
        assert_eq!(event, TrackerEvent::disabled("r-1"));
    }
}
