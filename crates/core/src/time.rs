use chrono::{DateTime, Duration, Utc};

/// Where the engine reads wall-clock time from.
///
/// Time spent on a test is the difference between two readings, so a
/// throttled or missed tick never skews it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    /// Frozen at one instant until moved with `advance`.
    Pinned(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn pinned(at: DateTime<Utc>) -> Self {
        Self::Pinned(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Pinned(at) => *at,
        }
    }

    /// Move a pinned clock forward; the system clock ignores this.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Pinned(at) = self {
            *at += delta;
        }
    }

    /// Whole seconds from `start` to now, zero if `start` lies ahead.
    #[must_use]
    pub fn seconds_since(&self, start: DateTime<Utc>) -> u64 {
        let elapsed = self.now().signed_duration_since(start).num_seconds();
        u64::try_from(elapsed).unwrap_or(0)
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        matches!(self, Clock::Pinned(_))
    }
}

/// 2023-11-14T22:13:20Z, the instant test clocks start at.
pub const PINNED_TIMESTAMP: i64 = 1_700_000_000;

#[must_use]
pub fn pinned_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(PINNED_TIMESTAMP, 0).unwrap_or_default()
}

/// A clock pinned at `pinned_now()`.
#[must_use]
pub fn pinned_clock() -> Clock {
    Clock::pinned(pinned_now())
}
