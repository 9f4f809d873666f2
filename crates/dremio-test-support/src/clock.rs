//! Wall clock that follows tokio's (possibly paused) timer.

use chrono::{DateTime, TimeDelta, Utc};
use dremio_core::Clock;
use tokio::time::Instant;

/// Reports `anchor` plus the tokio time elapsed since construction.
///
/// Under `#[tokio::test(start_paused = true)]` the reported time advances
/// exactly as far as the auto-advanced timer.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    anchor: DateTime<Utc>,
    started: Instant,
}

impl AnchoredClock {
    /// Clock reporting `anchor` right now.
    #[must_use]
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
