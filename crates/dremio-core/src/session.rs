//! Serializable poll session and terminal events for suspend/resume tracking.
//!
//! # Design
//! - The session is plain data: reflection id, connection reference, absolute
//!   deadline and poll interval. It can be persisted by a host scheduler and
//!   rebuilt from that tuple alone.
//! - Scheduling decisions are pure functions of the session and the current
//!   time so any driver (timer loop, external re-invocation) can use them.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{ReflectionRefreshStatus, StatusTaxonomy};

/// Source of wall-clock time for deadline decisions.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// State carried between suspended poll attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSession {
    /// Reflection being tracked.
    pub reflection_id: String,
    /// Connection reference used to rebuild the remote client on resume.
    pub connection_id: String,
    /// Absolute time after which the session reports a timeout.
    pub deadline: DateTime<Utc>,
    /// Seconds to wait between polls.
    pub poll_interval_secs: u64,
}

/// What a resumed session should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Fetch the current status.
    Poll,
    /// Stop and report the event.
    Emit(TrackerEvent),
}

/// Outcome class of a terminal tracker event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    /// Refresh completed successfully.
    Success,
    /// Reflection was disabled.
    Disabled,
    /// Refresh failed, timed out or could not be polled.
    Error,
}

impl TerminalStatus {
    /// Serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Disabled => "disabled",
            Self::Error => "error",
        }
    }
}

/// The single terminal signal produced by a tracking session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEvent {
    /// Outcome class.
    pub status: TerminalStatus,
    /// Reflection the event refers to.
    pub reflection_id: String,
    /// Human-readable summary.
    pub message: String,
}

impl TrackerEvent {
    /// Refresh finished in a success state.
    #[must_use]
    pub fn success(reflection_id: &str) -> Self {
        Self {
            status: TerminalStatus::Success,
            reflection_id: reflection_id.to_string(),
            message: format!("Refresh for reflection {reflection_id} has completed successfully."),
        }
    }

    /// Reflection was disabled while being tracked.
    #[must_use]
    pub fn disabled(reflection_id: &str) -> Self {
        Self {
            status: TerminalStatus::Disabled,
            reflection_id: reflection_id.to_string(),
            message: format!("Reflection {reflection_id} has been manually disabled."),
        }
    }

    /// Refresh finished in a failure state.
    #[must_use]
    pub fn failed(reflection_id: &str, state: ReflectionRefreshStatus) -> Self {
        Self {
            status: TerminalStatus::Error,
            reflection_id: reflection_id.to_string(),
            message: format!("Refresh for reflection {reflection_id} has failed with state {state}."),
        }
    }

    /// Deadline passed before a terminal state was observed.
    #[must_use]
    pub fn timed_out(reflection_id: &str, deadline: DateTime<Utc>) -> Self {
        Self {
            status: TerminalStatus::Error,
            reflection_id: reflection_id.to_string(),
            message: format!(
                "Refresh for reflection {reflection_id} has not finished by {}.",
                deadline.to_rfc3339()
            ),
        }
    }

    /// Polling itself failed.
    #[must_use]
    pub fn poll_failed(reflection_id: &str, detail: &str) -> Self {
        Self {
            status: TerminalStatus::Error,
            reflection_id: reflection_id.to_string(),
            message: format!("Refresh tracking for reflection {reflection_id} failed: {detail}"),
        }
    }
}

impl PollSession {
    /// Open a session whose deadline is `timeout` after `now`.
    #[must_use]
    pub fn start(
        reflection_id: impl Into<String>,
        connection_id: impl Into<String>,
        now: DateTime<Utc>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let timeout = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        Self {
            reflection_id: reflection_id.into(),
            connection_id: connection_id.into(),
            deadline: now
                .checked_add_signed(timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            poll_interval_secs: whole_seconds(poll_interval),
        }
    }

    /// Interval between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Time at which a session suspended at `now` should wake.
    #[must_use]
    pub fn wake_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = TimeDelta::from_std(self.poll_interval()).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Decide, on wake, whether to poll again or report the timeout.
    #[must_use]
    pub fn next_action(&self, now: DateTime<Utc>) -> NextAction {
        if now > self.deadline {
            NextAction::Emit(TrackerEvent::timed_out(&self.reflection_id, self.deadline))
        } else {
            NextAction::Poll
        }
    }

    /// Classify a polled status; `None` means keep waiting.
    #[must_use]
    pub fn settle(&self, status: ReflectionRefreshStatus) -> Option<TrackerEvent> {
        if !status.is_terminal() {
            return None;
        }
        let event = if status.is_success() {
            TrackerEvent::success(&self.reflection_id)
        } else if status == ReflectionRefreshStatus::Disabled {
            TrackerEvent::disabled(&self.reflection_id)
        } else {
            TrackerEvent::failed(&self.reflection_id, status)
        };
        Some(event)
    }
}

/// Seconds in `interval`, rounded up so a non-zero interval never becomes zero.
fn whole_seconds(interval: Duration) -> u64 {
    interval.as_secs() + u64::from(interval.subsec_nanos() > 0)
}
