//! Status taxonomies for remote job execution and reflection refreshes.
//!
//! # Design
//! - Each taxonomy is a closed enum; grouping lives in static partition tables
//!   rather than in the enum itself.
//! - Every state is either terminal or non-terminal, and every terminal state
//!   is either a success or a failure.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReflectionError, ReflectionResult};

/// Shared contract of a status enumeration and its partition tables.
pub trait StatusTaxonomy: Sized + Copy + Eq + 'static {
    /// Human-readable taxonomy name used in error reports.
    const TAXONOMY: &'static str;
    /// Every known state.
    const ALL: &'static [Self];
    /// States from which no further transition is expected.
    const TERMINAL: &'static [Self];
    /// States that are still progressing.
    const NON_TERMINAL: &'static [Self];
    /// Terminal states that count as success.
    const SUCCESS: &'static [Self];
    /// Terminal states that count as failure.
    const FAILURE: &'static [Self];

    /// Wire representation of the state.
    fn as_str(self) -> &'static str;

    /// Validate a raw status string against the enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::InvalidStatus`] when the value is unknown.
    fn parse(raw: &str) -> ReflectionResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == raw)
            .ok_or_else(|| ReflectionError::InvalidStatus {
                taxonomy: Self::TAXONOMY,
                value: raw.to_string(),
            })
    }

    /// Validate every member of a collection, failing on the first unknown value.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::InvalidStatus`] for the first unknown member.
    fn validate_all<I, S>(raw: I) -> ReflectionResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .map(|value| Self::parse(value.as_ref()))
            .collect()
    }

    /// Validate a raw status string and report whether it is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::InvalidStatus`] when the value is unknown.
    fn is_terminal_str(raw: &str) -> ReflectionResult<bool> {
        Self::parse(raw).map(Self::is_terminal)
    }

    /// Whether the state belongs to the terminal partition.
    fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    /// Whether the state is a terminal success.
    fn is_success(self) -> bool {
        Self::SUCCESS.contains(&self)
    }

    /// Whether the state is a terminal failure.
    fn is_failure(self) -> bool {
        Self::FAILURE.contains(&self)
    }
}

/// Lifecycle states of a generic SQL/metadata job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job accepted but not yet submitted.
    NotSubmitted,
    /// Job is starting.
    Starting,
    /// Job is running.
    Running,
    /// Job finished successfully.
    Completed,
    /// Job was cancelled.
    Canceled,
    /// Job failed.
    Failed,
    /// Cancellation was requested but not yet honoured.
    CancellationRequested,
    /// Query planning in progress.
    Planning,
    /// Waiting to be scheduled.
    Pending,
    /// Fetching source metadata.
    MetadataRetrieval,
    /// Waiting in an engine queue.
    Queued,
    /// Waiting for an engine to start.
    EngineStart,
    /// Execution planning in progress.
    ExecutionPlanning,
    /// Remote system reports an invalid job state.
    InvalidState,
}

impl StatusTaxonomy for JobStatus {
    const TAXONOMY: &'static str = "job";
    const ALL: &'static [Self] = &[
        Self::NotSubmitted,
        Self::Starting,
        Self::Running,
        Self::Completed,
        Self::Canceled,
        Self::Failed,
        Self::CancellationRequested,
        Self::Planning,
        Self::Pending,
        Self::MetadataRetrieval,
        Self::Queued,
        Self::EngineStart,
        Self::ExecutionPlanning,
        Self::InvalidState,
    ];
    const TERMINAL: &'static [Self] = &[
        Self::Completed,
        Self::Canceled,
        Self::Failed,
        Self::InvalidState,
    ];
    const NON_TERMINAL: &'static [Self] = &[
        Self::NotSubmitted,
        Self::Starting,
        Self::Running,
        Self::CancellationRequested,
        Self::Planning,
        Self::Pending,
        Self::MetadataRetrieval,
        Self::Queued,
        Self::ExecutionPlanning,
        Self::EngineStart,
    ];
    const SUCCESS: &'static [Self] = &[Self::Completed];
    const FAILURE: &'static [Self] = &[Self::Canceled, Self::Failed, Self::InvalidState];

    fn as_str(self) -> &'static str {
        match self {
            Self::NotSubmitted => "NOT_SUBMITTED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::CancellationRequested => "CANCELLATION_REQUESTED",
            Self::Planning => "PLANNING",
            Self::Pending => "PENDING",
            Self::MetadataRetrieval => "METADATA_RETRIEVAL",
            Self::Queued => "QUEUED",
            Self::EngineStart => "ENGINE_START",
            Self::ExecutionPlanning => "EXECUTION_PLANNING",
            Self::InvalidState => "INVALID_STATE",
        }
    }
}

/// Combined refresh status of a reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReflectionRefreshStatus {
    /// Reflection is materialized and usable.
    CanAccelerate,
    /// Reflection is usable but the last refresh reported failures.
    CanAccelerateWithFailures,
    /// Reflection is stale and needs a manual refresh.
    CannotAccelerateManual,
    /// Reflection is stale and waits for its schedule.
    CannotAccelerateScheduled,
    /// Reflection was disabled.
    Disabled,
    /// Reflection expired.
    Expired,
    /// Refresh failed.
    Failed,
    /// Reflection definition is invalid.
    Invalid,
    /// Refresh has not produced a usable materialization yet.
    Incomplete,
    /// Refresh in progress.
    Refreshing,
}

impl StatusTaxonomy for ReflectionRefreshStatus {
    const TAXONOMY: &'static str = "reflection refresh";
    const ALL: &'static [Self] = &[
        Self::CanAccelerate,
        Self::CanAccelerateWithFailures,
        Self::CannotAccelerateManual,
        Self::CannotAccelerateScheduled,
        Self::Disabled,
        Self::Expired,
        Self::Failed,
        Self::Invalid,
        Self::Incomplete,
        Self::Refreshing,
    ];
    const TERMINAL: &'static [Self] = &[
        Self::CanAccelerate,
        Self::CanAccelerateWithFailures,
        Self::CannotAccelerateScheduled,
        Self::CannotAccelerateManual,
        Self::Disabled,
        Self::Expired,
        Self::Failed,
        Self::Invalid,
    ];
    const NON_TERMINAL: &'static [Self] = &[Self::Incomplete, Self::Refreshing];
    const SUCCESS: &'static [Self] = &[Self::CanAccelerate];
    const FAILURE: &'static [Self] = &[
        Self::CanAccelerateWithFailures,
        Self::CannotAccelerateScheduled,
        Self::CannotAccelerateManual,
        Self::Disabled,
        Self::Expired,
        Self::Failed,
        Self::Invalid,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::CanAccelerate => "CAN_ACCELERATE",
            Self::CanAccelerateWithFailures => "CAN_ACCELERATE_WITH_FAILURES",
            Self::CannotAccelerateManual => "CANNOT_ACCELERATE_MANUAL",
            Self::CannotAccelerateScheduled => "CANNOT_ACCELERATE_SCHEDULED",
            Self::Disabled => "DISABLED",
            Self::Expired => "EXPIRED",
            Self::Failed => "FAILED",
            Self::Invalid => "INVALID",
            Self::Incomplete => "INCOMPLETE",
            Self::Refreshing => "REFRESHING",
        }
    }
}

macro_rules! impl_status_text {
    ($status:ty) => {
        impl Display for $status {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }

        impl FromStr for $status {
            type Err = ReflectionError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                <Self as StatusTaxonomy>::parse(raw)
            }
        }
    };
}

impl_status_text!(JobStatus);
impl_status_text!(ReflectionRefreshStatus);

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partitioned<T: StatusTaxonomy + std::fmt::Debug>() {
        for state in T::ALL {
            let terminal = T::TERMINAL.contains(state);
            let non_terminal = T::NON_TERMINAL.contains(state);
            assert!(terminal ^ non_terminal, "{state:?} must be in exactly one group");
            if terminal {
                assert!(
                    state.is_success() ^ state.is_failure(),
                    "{state:?} must be success xor failure"
                );
            } else {
                assert!(!state.is_success() && !state.is_failure());
            }
            assert_eq!(T::is_terminal_str(state.as_str()).ok(), Some(terminal));
        }
        assert_eq!(T::TERMINAL.len() + T::NON_TERMINAL.len(), T::ALL.len());
    }

    #[test]
    fn job_status_partition_is_consistent() {
        assert_partitioned::<JobStatus>();
    }

    #[test]
    fn refresh_status_partition_is_consistent() {
        assert_partitioned::<ReflectionRefreshStatus>();
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = ReflectionRefreshStatus::parse("ACCELERATING").err();
        assert!(matches!(
            err,
            Some(ReflectionError::InvalidStatus { taxonomy: "reflection refresh", ref value })
                if value == "ACCELERATING"
        ));
        assert!(JobStatus::is_terminal_str("completed").is_err());
    }

    #[test]
    fn bulk_validation_fails_on_first_unknown_member() {
        let ok = ReflectionRefreshStatus::validate_all(["REFRESHING", "CAN_ACCELERATE"]);
        assert_eq!(
            ok.ok(),
            Some(vec![
                ReflectionRefreshStatus::Refreshing,
                ReflectionRefreshStatus::CanAccelerate
            ])
        );

        let err = JobStatus::validate_all(vec!["RUNNING", "BOGUS", "ALSO_BOGUS"]).err();
        assert!(matches!(
            err,
            Some(ReflectionError::InvalidStatus { ref value, .. }) if value == "BOGUS"
        ));
    }

    #[test]
    fn taxonomies_share_names_but_not_membership() {
        assert!(JobStatus::Failed.is_failure());
        assert!(ReflectionRefreshStatus::Failed.is_failure());
        assert!(JobStatus::parse("REFRESHING").is_err());
        assert!(ReflectionRefreshStatus::parse("RUNNING").is_err());
    }

    #[test]
    fn display_and_serde_agree_with_wire_names() -> anyhow::Result<()> {
        for state in ReflectionRefreshStatus::ALL {
            let json = serde_json::to_string(state)?;
            assert_eq!(json, format!("\"{state}\""));
            assert_eq!(state.as_str().parse::<ReflectionRefreshStatus>()?, *state);
        }
        for state in JobStatus::ALL {
            let json = serde_json::to_string(state)?;
            assert_eq!(json, format!("\"{state}\""));
        }
        Ok(())
    }
}
