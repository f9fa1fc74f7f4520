/// What a single `tick` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining_seconds: u64 },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
    Expired,
}

/// Second-granularity countdown driven from outside.
///
/// The timer owns no task; whoever drives the engine calls `tick` once per
/// second. Expiry fires at most once per `start`/`reset` cycle and an expired
/// timer cannot be resumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountdownTimer {
    total_seconds: u64,
    remaining_seconds: u64,
    phase: Phase,
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm and run a new cycle.
    pub fn start(&mut self, total_seconds: u64) {
        self.total_seconds = total_seconds;
        self.remaining_seconds = total_seconds;
        self.phase = Phase::Running;
    }

    /// Arm a new cycle without running it; `resume` starts the countdown.
    pub fn reset(&mut self, total_seconds: u64) {
        self.total_seconds = total_seconds;
        self.remaining_seconds = total_seconds;
        self.phase = Phase::Paused;
    }

    /// Returns true if the timer was running.
    pub fn pause(&mut self) -> bool {
        if self.phase == Phase::Running {
            self.phase = Phase::Paused;
            true
        } else {
            false
        }
    }

    /// Returns true if the timer was paused and is now running.
    pub fn resume(&mut self) -> bool {
        if self.phase == Phase::Paused {
            self.phase = Phase::Running;
            true
        } else {
            false
        }
    }

    /// Disarm without expiring.
    pub fn stop(&mut self) {
        if self.phase != Phase::Expired {
            self.phase = Phase::Idle;
        }
    }

    /// Advance one second. Returns `None` unless the timer is running.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.phase != Phase::Running {
            return None;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = Phase::Expired;
            Some(TimerEvent::Expired)
        } else {
            Some(TimerEvent::Tick {
                remaining_seconds: self.remaining_seconds,
            })
        }
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.phase == Phase::Expired
    }

    /// Derived from the remaining fraction; never stored.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_low(&self, ratio: f64) -> bool {
        if self.total_seconds == 0 {
            return false;
        }
        (self.remaining_seconds as f64) / (self.total_seconds as f64) <= ratio
    }
}
