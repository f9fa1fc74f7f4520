use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one test attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Setup,
    Generating,
    InProgress,
    Expired,
    Submitting,
    Complete,
}

impl EngineState {
    /// Legal edges of the state machine.
    #[must_use]
    pub fn can_transition_to(self, to: EngineState) -> bool {
        use EngineState::{Complete, Expired, Generating, InProgress, Setup, Submitting};
        matches!(
            (self, to),
            (Setup, Generating)
                | (Generating, InProgress | Setup)
                | (InProgress, Submitting | Expired)
                | (Expired, Submitting)
                | (Submitting, Complete | InProgress | Expired)
        )
    }

    /// States in which a background clock still has work to do.
    #[must_use]
    pub fn needs_clock(self) -> bool {
        matches!(
            self,
            EngineState::Generating | EngineState::InProgress | EngineState::Submitting
        )
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        self == EngineState::Complete
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Setup => "setup",
            EngineState::Generating => "generating",
            EngineState::InProgress => "in progress",
            EngineState::Expired => "expired",
            EngineState::Submitting => "submitting",
            EngineState::Complete => "complete",
        };
        f.write_str(name)
    }
}
