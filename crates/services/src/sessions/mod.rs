mod driver;
mod engine;
mod state;
mod timer;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use driver::{ClockTask, SessionDriver, SubmitOutcome};
pub use engine::{Navigation, SubmitStart, TestSessionEngine, TickOutcome};
pub use state::EngineState;
pub use timer::{CountdownTimer, TimerEvent};
