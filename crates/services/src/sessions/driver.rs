use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use backend::PracticeBackend;
use practice_core::Clock;
use practice_core::model::{AccessStatus, EngineSettings, TestConfig};

use crate::cancel::CancellationToken;
use crate::error::{DownloadError, SessionError, SubmissionError, TestStartError};
use crate::events::{EngineEvent, EventBus};
use crate::results::{self, ResultReport};
use crate::sessions::engine::{Navigation, SubmitStart, TestSessionEngine, TickOutcome};
use crate::sessions::state::EngineState;

/// Result of a `SessionDriver::submit` call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Completed(Box<ResultReport>),
    /// Another submission is pending; this call did nothing.
    InFlight,
    AlreadyComplete,
    /// The access gate refused; an `AccessDenied` event was emitted.
    AccessDenied,
}

/// Runs the network legs of an attempt around a `TestSessionEngine`.
///
/// The engine lock is never held across a backend call.
#[derive(Clone)]
pub struct SessionDriver {
    engine: Arc<Mutex<TestSessionEngine>>,
    backend: Arc<dyn PracticeBackend>,
    events: EventBus,
    settings: EngineSettings,
    clock: Clock,
}

impl SessionDriver {
    #[must_use]
    pub fn new(backend: Arc<dyn PracticeBackend>, settings: EngineSettings, clock: Clock) -> Self {
        Self::with_events(backend, settings, clock, EventBus::default())
    }

    #[must_use]
    pub fn with_events(
        backend: Arc<dyn PracticeBackend>,
        settings: EngineSettings,
        clock: Clock,
        events: EventBus,
    ) -> Self {
        let engine = TestSessionEngine::new(settings.clone(), clock, events.clone());
        Self {
            engine: Arc::new(Mutex::new(engine)),
            backend,
            events,
            settings,
            clock,
        }
    }

    #[must_use]
    pub fn engine(&self) -> Arc<Mutex<TestSessionEngine>> {
        Arc::clone(&self.engine)
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> EngineState {
        self.engine.lock().await.state()
    }

    pub async fn report(&self) -> Option<ResultReport> {
        self.engine.lock().await.report().cloned()
    }

    /// # Errors
    ///
    /// See `TestSessionEngine::answer`.
    pub async fn answer(&self, index: usize, option: usize) -> Result<(), SessionError> {
        self.engine.lock().await.answer(index, option)
    }

    /// # Errors
    ///
    /// See `TestSessionEngine::navigate`.
    pub async fn navigate(&self, index: usize) -> Result<Navigation, SessionError> {
        self.engine.lock().await.navigate(index)
    }

    async fn fetch_access(&self) -> AccessStatus {
        match self.backend.get_access_status().await {
            Ok(status) => status,
            Err(err) => {
                let limit = self.engine.lock().await.access().free_question_limit;
                warn!(error = %err, "access status unavailable, assuming free tier");
                AccessStatus::free(limit)
            }
        }
    }

    /// Re-read the user's access status, e.g. after an upgrade. A failed fetch
    /// falls back to the free tier.
    pub async fn refresh_access(&self) -> AccessStatus {
        let status = self.fetch_access().await;
        self.engine.lock().await.update_access(status.clone());
        status
    }

    /// Create a session for `config` and start the clock. Access status is
    /// refreshed alongside.
    ///
    /// # Errors
    ///
    /// Returns `TestStartError` if the engine is not in `Setup` or the server
    /// could not create the session; the engine is back in `Setup` then.
    pub async fn start_test(&self, config: TestConfig) -> Result<(), TestStartError> {
        self.engine.lock().await.begin_start(config.clone())?;

        let (access, started) =
            tokio::join!(self.fetch_access(), self.backend.start_test(&config));

        let mut engine = self.engine.lock().await;
        engine.update_access(access);
        match started {
            Ok(session) => {
                engine.finish_start(session)?;
                Ok(())
            }
            Err(err) => {
                engine.fail_start(&err.to_string())?;
                Err(err.into())
            }
        }
    }

    /// Submit the attempt. Concurrent calls while one is pending are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Api` when the server call fails; the engine is
    /// back in its pre-submit state with every answer intact.
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmissionError> {
        let start = self.engine.lock().await.begin_submit()?;
        let payload = match start {
            SubmitStart::Ready(payload) => payload,
            SubmitStart::InFlight => return Ok(SubmitOutcome::InFlight),
            SubmitStart::AlreadyComplete => return Ok(SubmitOutcome::AlreadyComplete),
            SubmitStart::Denied => return Ok(SubmitOutcome::AccessDenied),
        };

        match self.backend.submit_test(&payload).await {
            Ok(response) => {
                let report = self.engine.lock().await.complete_submit(response)?;
                Ok(SubmitOutcome::Completed(Box::new(report)))
            }
            Err(err) => {
                self.engine.lock().await.fail_submit(err.to_string())?;
                Err(SubmissionError::Api(err))
            }
        }
    }

    /// Advance the countdown once and submit if time ran out and access allows.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the automatic submission fails.
    pub async fn tick(&self) -> Result<TickOutcome, SubmissionError> {
        let outcome = self.engine.lock().await.tick()?;
        if outcome == TickOutcome::SubmitDue {
            self.submit().await?;
        }
        Ok(outcome)
    }

    /// Drive `tick` every `tick_interval_ms` on a background task.
    ///
    /// The task stops on its own once the attempt no longer needs a clock
    /// (expired, complete, or back in setup), or when the returned handle is
    /// cancelled.
    #[must_use]
    pub fn spawn_clock(&self) -> ClockTask {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let driver = self.clone();
        let period = Duration::from_millis(self.settings.tick_interval_ms());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match driver.tick().await {
                    Ok(TickOutcome::SubmitDue | TickOutcome::ExpiredBlocked) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "automatic submission failed");
                        break;
                    }
                }
                if !driver.state().await.needs_clock() {
                    break;
                }
            }
            debug!("session clock stopped");
        });

        ClockTask { cancel, handle }
    }

    /// Start a fresh attempt with the previous config. This driver's engine is
    /// left as it is.
    ///
    /// # Errors
    ///
    /// Returns `TestStartError::NothingToRetake` if no test was ever started,
    /// or whatever starting the new attempt fails with.
    pub async fn retake(&self) -> Result<SessionDriver, TestStartError> {
        let config = self
            .engine
            .lock()
            .await
            .config()
            .cloned()
            .ok_or(TestStartError::NothingToRetake)?;
        let fresh = SessionDriver::with_events(
            Arc::clone(&self.backend),
            self.settings.clone(),
            self.clock,
            self.events.clone(),
        );
        fresh.start_test(config).await?;
        info!("retake started");
        Ok(fresh)
    }

    /// Download the scored test as a PDF.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::NotComplete` before scoring and
    /// `DownloadError::RequiresPayment` when the export is a paid feature.
    pub async fn download_pdf(&self) -> Result<Vec<u8>, DownloadError> {
        let test_id = self
            .engine
            .lock()
            .await
            .report()
            .map(|report| report.result.test_id)
            .ok_or(DownloadError::NotComplete)?;
        results::download_pdf(self.backend.as_ref(), test_id).await
    }
}

impl fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.engine.try_lock().map(|engine| engine.state()).ok();
        f.debug_struct("SessionDriver")
            .field("state", &state)
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Handle to the background clock started by `SessionDriver::spawn_clock`.
#[derive(Debug)]
pub struct ClockTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ClockTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to stop by itself.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            warn!(error = %err, "session clock task failed");
        }
    }

    pub async fn stop(self) {
        self.cancel();
        self.join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::InMemoryBackend;

    #[tokio::test]
    async fn debug_output_reports_state_without_the_backend() {
        let driver = SessionDriver::new(
            Arc::new(InMemoryBackend::new()),
            EngineSettings::default(),
            Clock::default(),
        );
        let rendered = format!("{driver:?}");
        assert!(rendered.starts_with("SessionDriver"));
        assert!(rendered.contains("Setup"));
        assert!(!rendered.contains("InMemoryBackend"));

        let engine = driver.engine();
        let _guard = engine.lock().await;
        assert!(format!("{driver:?}").contains("state: None"));
    }
}
