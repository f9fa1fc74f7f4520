//! Lifecycle events the engine publishes for the presentation layer.
//!
//! The engine never renders anything itself; whatever shows toasts, upsell
//! dialogs or a countdown subscribes here.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use practice_core::model::{SubjectId, TestSessionId};

use crate::sessions::EngineState;

const DEFAULT_CAPACITY: usize = 256;

/// Why the access gate stopped an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDeniedReason {
    Navigation,
    Submission,
    Expiry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        from: EngineState,
        to: EngineState,
    },
    /// Expected control flow, not an error: the user needs to upgrade.
    AccessDenied {
        requested_index: usize,
        reason: AccessDeniedReason,
    },
    PollProgress {
        attempt: u32,
        max_attempts: u32,
        resolved: BTreeSet<SubjectId>,
        pending: BTreeSet<SubjectId>,
    },
    TimerTick {
        remaining_seconds: u64,
        total_seconds: u64,
        low_time: bool,
    },
    TimerExpired,
    SubmissionResult {
        test_id: TestSessionId,
        score: f64,
        correct_answers: u32,
        total_questions: u32,
    },
    SubmissionError {
        message: String,
    },
}

/// Fan-out channel for `EngineEvent`s.
///
/// Cloning shares the channel. Emitting with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        trace!(?event, "engine event");
        // No receivers is not an error; the UI may not be listening yet.
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Drain everything currently buffered on a receiver without waiting.
#[must_use]
pub fn drain(receiver: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitting_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(EngineEvent::TimerExpired);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_see_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(EngineEvent::StateChanged {
            from: EngineState::Setup,
            to: EngineState::Generating,
        });
        bus.emit(EngineEvent::TimerExpired);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], EngineEvent::TimerExpired);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let value = serde_json::to_value(EngineEvent::AccessDenied {
            requested_index: 5,
            reason: AccessDeniedReason::Navigation,
        })
        .unwrap();
        assert_eq!(value["type"], "access_denied");
        assert_eq!(value["reason"], "navigation");
        assert_eq!(value["requested_index"], 5);
    }
}
