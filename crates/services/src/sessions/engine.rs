use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use practice_core::model::{
    AccessStatus, AnswerLedger, EngineSettings, ExpiryPolicy, LedgerError, Question,
    SubmissionPayload, SubmitResponse, TestConfig, TestSession,
};
use practice_core::{AccessGate, Clock};

use crate::error::SessionError;
use crate::events::{AccessDeniedReason, EngineEvent, EventBus};
use crate::results::{ResultCompiler, ResultReport};
use crate::sessions::state::EngineState;
use crate::sessions::timer::{CountdownTimer, TimerEvent};

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(usize),
    /// The access gate refused; an `AccessDenied` event was emitted.
    Denied,
    /// Already at the first/last question.
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running (paused, or not in progress).
    Idle,
    Ticked { remaining_seconds: u64 },
    /// Time ran out and the attempt may be submitted now.
    SubmitDue,
    /// Time ran out but the access gate blocks submission.
    ExpiredBlocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStart {
    /// The engine is now `Submitting`; send this payload.
    Ready(SubmissionPayload),
    /// Another submission is pending; nothing was done.
    InFlight,
    AlreadyComplete,
    /// The access gate refused; an `AccessDenied` event was emitted.
    Denied,
}

#[derive(Debug, Clone)]
struct Attempt {
    session: TestSession,
    ledger: AnswerLedger,
    started_at: DateTime<Utc>,
}

/// What a failed submission returns to.
#[derive(Debug, Clone, Copy)]
struct PreSubmit {
    state: EngineState,
    timer_running: bool,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// State machine for one test attempt.
///
/// Synchronous and single-writer: network legs happen outside (see
/// `SessionDriver`), and every state change goes through `transition`.
#[derive(Debug)]
pub struct TestSessionEngine {
    state: EngineState,
    settings: EngineSettings,
    clock: Clock,
    events: EventBus,
    access: AccessStatus,
    config: Option<TestConfig>,
    attempt: Option<Attempt>,
    current_index: usize,
    timer: CountdownTimer,
    pre_submit: Option<PreSubmit>,
    report: Option<ResultReport>,
}

impl TestSessionEngine {
    #[must_use]
    pub fn new(settings: EngineSettings, clock: Clock, events: EventBus) -> Self {
        Self {
            state: EngineState::Setup,
            settings,
            clock,
            events,
            access: AccessStatus::free(0),
            config: None,
            attempt: None,
            current_index: 0,
            timer: CountdownTimer::new(),
            pre_submit: None,
            report: None,
        }
    }

    #[must_use]
    pub fn with_access(mut self, access: AccessStatus) -> Self {
        self.access = access;
        self
    }

    fn transition(&mut self, to: EngineState) -> Result<(), SessionError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(SessionError::InvalidTransition { from, to });
        }

        match to {
            EngineState::InProgress if from == EngineState::Generating => {
                if let Some(attempt) = &self.attempt {
                    self.timer.start(attempt.session.duration_seconds());
                }
            }
            // Back from a failed submission; `fail_submit` restores the timer phase.
            EngineState::InProgress => {}
            EngineState::Submitting => {
                self.timer.pause();
            }
            EngineState::Setup | EngineState::Complete => self.timer.stop(),
            EngineState::Generating | EngineState::Expired => {}
        }

        self.state = to;
        info!(%from, %to, "engine state changed");
        self.events.emit(EngineEvent::StateChanged { from, to });
        Ok(())
    }

    fn attempt_in_progress(&self) -> Result<&Attempt, SessionError> {
        if self.state != EngineState::InProgress {
            return Err(SessionError::NotAllowed(self.state));
        }
        self.attempt.as_ref().ok_or(SessionError::NoSession)
    }

    fn ledger_in_progress(&mut self) -> Result<&mut AnswerLedger, SessionError> {
        if self.state != EngineState::InProgress {
            return Err(SessionError::NotAllowed(self.state));
        }
        self.attempt
            .as_mut()
            .map(|attempt| &mut attempt.ledger)
            .ok_or(SessionError::NoSession)
    }

    /// The session's own limit wins; the access status is the fallback.
    fn free_question_limit(&self) -> u32 {
        match &self.attempt {
            Some(attempt) if attempt.session.free_question_limit() > 0 => {
                attempt.session.free_question_limit()
            }
            _ => self.access.free_question_limit,
        }
    }

    fn may_submit(&self) -> bool {
        if self.state == EngineState::Expired
            && self.settings.expiry_policy() == ExpiryPolicy::SubmitRegardless
        {
            return true;
        }
        let count = self.attempt.as_ref().map_or(0, |a| a.session.len());
        AccessGate::allows_submission(
            &self.access,
            count,
            self.free_question_limit(),
            self.clock.now(),
        )
    }

    fn deny(&self, requested_index: usize, reason: AccessDeniedReason) {
        debug!(requested_index, ?reason, "access gate refused");
        self.events.emit(EngineEvent::AccessDenied {
            requested_index,
            reason,
        });
    }

    //
    // ─── START ─────────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the engine is in `Setup`.
    pub fn begin_start(&mut self, config: TestConfig) -> Result<(), SessionError> {
        self.transition(EngineState::Generating)?;
        self.config = Some(config);
        self.attempt = None;
        self.report = None;
        Ok(())
    }

    /// Store the generated session and start the clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` unless the engine is `Generating`.
    pub fn finish_start(&mut self, session: TestSession) -> Result<(), SessionError> {
        if self.state != EngineState::Generating {
            return Err(SessionError::NotAllowed(self.state));
        }
        info!(
            test_id = %session.id(),
            questions = session.len(),
            duration_seconds = session.duration_seconds(),
            "test session started"
        );
        self.attempt = Some(Attempt {
            ledger: AnswerLedger::for_questions(session.questions()),
            session,
            started_at: self.clock.now(),
        });
        self.current_index = 0;
        self.transition(EngineState::InProgress)
    }

    /// Drop back to `Setup` after the session could not be created. The config
    /// is kept so the same test can be retried.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the engine is `Generating`.
    pub fn fail_start(&mut self, reason: &str) -> Result<(), SessionError> {
        self.transition(EngineState::Setup)?;
        self.attempt = None;
        warn!(%reason, "test session could not be started");
        Ok(())
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// Record an answer. Answering is never gated; only navigation is.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` outside `InProgress` and
    /// `SessionError::Ledger` for out-of-range indices.
    pub fn answer(&mut self, index: usize, option: usize) -> Result<(), SessionError> {
        self.ledger_in_progress()?.set_answer(index, option)?;
        debug!(index, option, "answer recorded");
        Ok(())
    }

    /// # Errors
    ///
    /// Same as `answer`.
    pub fn clear_answer(&mut self, index: usize) -> Result<Option<usize>, SessionError> {
        Ok(self.ledger_in_progress()?.clear_answer(index)?)
    }

    /// # Errors
    ///
    /// Same as `answer`.
    pub fn toggle_flag(&mut self, index: usize) -> Result<bool, SessionError> {
        Ok(self.ledger_in_progress()?.toggle_flag(index)?)
    }

    /// # Errors
    ///
    /// Same as `answer`.
    pub fn toggle_bookmark(&mut self, index: usize) -> Result<bool, SessionError> {
        Ok(self.ledger_in_progress()?.toggle_bookmark(index)?)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move to a question if the access gate allows it. A refusal leaves the
    /// engine untouched and emits `AccessDenied`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` outside `InProgress` and
    /// `SessionError::Ledger` if `index` is past the last question.
    pub fn navigate(&mut self, index: usize) -> Result<Navigation, SessionError> {
        let len = self.attempt_in_progress()?.session.len();
        if index >= len {
            return Err(LedgerError::IndexOutOfRange { index, len }.into());
        }
        let allowed = AccessGate::allows(
            &self.access,
            index,
            self.free_question_limit(),
            self.clock.now(),
        );
        if !allowed {
            self.deny(index, AccessDeniedReason::Navigation);
            return Ok(Navigation::Denied);
        }
        self.current_index = index;
        Ok(Navigation::Moved(index))
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` outside `InProgress`.
    pub fn next(&mut self) -> Result<Navigation, SessionError> {
        let len = self.attempt_in_progress()?.session.len();
        if self.current_index + 1 >= len {
            return Ok(Navigation::Boundary);
        }
        self.navigate(self.current_index + 1)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` outside `InProgress`.
    pub fn previous(&mut self) -> Result<Navigation, SessionError> {
        self.attempt_in_progress()?;
        match self.current_index.checked_sub(1) {
            Some(index) => self.navigate(index),
            None => Ok(Navigation::Boundary),
        }
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    /// Advance the countdown by one second.
    ///
    /// Only acts while `InProgress`, so expiry and a manual submission can never
    /// both win.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the expiry edge is refused.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        if self.state != EngineState::InProgress {
            return Ok(TickOutcome::Idle);
        }
        match self.timer.tick() {
            None => Ok(TickOutcome::Idle),
            Some(TimerEvent::Tick { remaining_seconds }) => {
                self.events.emit(EngineEvent::TimerTick {
                    remaining_seconds,
                    total_seconds: self.timer.total_seconds(),
                    low_time: self.is_low_on_time(),
                });
                Ok(TickOutcome::Ticked { remaining_seconds })
            }
            Some(TimerEvent::Expired) => {
                self.events.emit(EngineEvent::TimerTick {
                    remaining_seconds: 0,
                    total_seconds: self.timer.total_seconds(),
                    low_time: true,
                });
                self.transition(EngineState::Expired)?;
                self.events.emit(EngineEvent::TimerExpired);
                if self.may_submit() {
                    info!("time is up, submitting");
                    Ok(TickOutcome::SubmitDue)
                } else {
                    info!("time is up, submission needs access");
                    self.deny(self.last_index(), AccessDeniedReason::Expiry);
                    Ok(TickOutcome::ExpiredBlocked)
                }
            }
        }
    }

    /// Returns true if the timer was running.
    pub fn pause_timer(&mut self) -> bool {
        self.state == EngineState::InProgress && self.timer.pause()
    }

    /// Returns true if the timer was paused and is running again.
    pub fn resume_timer(&mut self) -> bool {
        self.state == EngineState::InProgress && self.timer.resume()
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Gate and snapshot the attempt for submission.
    ///
    /// A second call while a submission is pending is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` before a session exists.
    pub fn begin_submit(&mut self) -> Result<SubmitStart, SessionError> {
        match self.state {
            EngineState::Submitting => {
                debug!("submission already in flight");
                return Ok(SubmitStart::InFlight);
            }
            EngineState::Complete => return Ok(SubmitStart::AlreadyComplete),
            EngineState::InProgress | EngineState::Expired => {}
            other => return Err(SessionError::NotAllowed(other)),
        }

        if !self.may_submit() {
            let reason = if self.state == EngineState::Expired {
                AccessDeniedReason::Expiry
            } else {
                AccessDeniedReason::Submission
            };
            self.deny(self.last_index(), reason);
            return Ok(SubmitStart::Denied);
        }

        let time_spent = self.elapsed_seconds();
        let attempt = self.attempt.as_ref().ok_or(SessionError::NoSession)?;
        let payload = ResultCompiler::build_payload(&attempt.session, &attempt.ledger, time_spent);

        self.pre_submit = Some(PreSubmit {
            state: self.state,
            timer_running: self.timer.is_running(),
        });
        self.transition(EngineState::Submitting)?;
        info!(
            test_id = %payload.session_id,
            answered = payload.answers.iter().filter(|a| a.user_answer.is_some()).count(),
            time_spent,
            "submitting test"
        );
        Ok(SubmitStart::Ready(payload))
    }

    /// Store the scored result and finish the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` unless the engine is `Submitting`.
    pub fn complete_submit(&mut self, response: SubmitResponse) -> Result<ResultReport, SessionError> {
        if self.state != EngineState::Submitting {
            return Err(SessionError::NotAllowed(self.state));
        }
        let attempt = self.attempt.as_ref().ok_or(SessionError::NoSession)?;
        let report = ResultCompiler::reconcile(&attempt.session, &attempt.ledger, response);

        self.pre_submit = None;
        self.report = Some(report.clone());
        self.transition(EngineState::Complete)?;

        let result = &report.result;
        info!(
            test_id = %result.test_id,
            score = result.score,
            correct = result.correct_answers,
            total = result.total_questions,
            "test scored"
        );
        self.events.emit(EngineEvent::SubmissionResult {
            test_id: result.test_id,
            score: result.score,
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
        });
        Ok(report)
    }

    /// Return to whichever state preceded the submission. Answers are untouched
    /// and the submission may be retried.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` unless the engine is `Submitting`.
    pub fn fail_submit(&mut self, message: impl Into<String>) -> Result<EngineState, SessionError> {
        if self.state != EngineState::Submitting {
            return Err(SessionError::NotAllowed(self.state));
        }
        let message = message.into();
        let PreSubmit {
            state: restored,
            timer_running,
        } = self.pre_submit.take().unwrap_or(PreSubmit {
            state: EngineState::InProgress,
            timer_running: true,
        });
        warn!(%message, %restored, "submission failed, answers kept");
        self.transition(restored)?;
        if timer_running {
            self.timer.resume();
        }
        self.events.emit(EngineEvent::SubmissionError { message });
        Ok(restored)
    }

    //
    // ─── ACCESS ────────────────────────────────────────────────────────────────
    //

    pub fn update_access(&mut self, access: AccessStatus) {
        debug!(
            role = ?access.role,
            has_paid = access.has_paid,
            free_question_limit = access.free_question_limit,
            "access status updated"
        );
        self.access = access;
    }

    //
    // ─── READ ──────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn access(&self) -> &AccessStatus {
        &self.access
    }

    #[must_use]
    pub fn config(&self) -> Option<&TestConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&TestSession> {
        self.attempt.as_ref().map(|a| &a.session)
    }

    #[must_use]
    pub fn ledger(&self) -> Option<&AnswerLedger> {
        self.attempt.as_ref().map(|a| &a.ledger)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.session()?.question(self.current_index)
    }

    fn last_index(&self) -> usize {
        self.session().map_or(0, |s| s.len().saturating_sub(1))
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.timer.remaining_seconds()
    }

    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        self.timer.total_seconds()
    }

    #[must_use]
    pub fn is_low_on_time(&self) -> bool {
        self.timer.is_low(self.settings.low_time_ratio())
    }

    /// Wall-clock seconds since the session started, capped at its duration.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.attempt.as_ref().map_or(0, |attempt| {
            self.clock
                .seconds_since(attempt.started_at)
                .min(attempt.session.duration_seconds())
        })
    }

    #[must_use]
    pub fn report(&self) -> Option<&ResultReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;
    use chrono::Duration;
    use practice_core::model::{
        Difficulty, QuestionDetail, QuestionId, SubjectId, TestResult, TestSessionId, TopicScope,
    };
    use practice_core::time::pinned_now;
    use std::collections::{BTreeMap, BTreeSet};

    fn config() -> TestConfig {
        TestConfig::new(
            BTreeSet::from([SubjectId::new(1)]),
            TopicScope::Random,
            Difficulty::Easy,
            10,
            5,
        )
        .unwrap()
    }

    fn session(n: u64, minutes: u32) -> TestSession {
        let questions = (1..=n)
            .map(|i| Question {
                id: QuestionId::new(i),
                text: format!("Q{i}"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                subject: "Physics".into(),
                topic: "Optics".into(),
            })
            .collect();
        TestSession::new(TestSessionId::new(1), questions, minutes, 5).unwrap()
    }

    fn engine_with(access: AccessStatus, settings: EngineSettings) -> TestSessionEngine {
        let mut engine = TestSessionEngine::new(settings, Clock::pinned(pinned_now()), EventBus::default())
            .with_access(access);
        engine.begin_start(config()).unwrap();
        engine.finish_start(session(10, 5)).unwrap();
        engine
    }

    fn free_engine() -> TestSessionEngine {
        engine_with(AccessStatus::free(5), EngineSettings::default())
    }

    fn response(ledger: &AnswerLedger) -> SubmitResponse {
        SubmitResponse {
            test_result: TestResult {
                test_id: TestSessionId::new(1),
                score: 10.0,
                correct_answers: 1,
                total_questions: 10,
                time_spent_seconds: 60,
                subject_scores: BTreeMap::new(),
            },
            questions: (0..ledger.question_count())
                .map(|i| QuestionDetail {
                    question_id: QuestionId::new(i as u64 + 1),
                    correct_answer: 0,
                    user_answer: ledger.answer(i),
                    is_correct: ledger.answer(i) == Some(0),
                    explanation: None,
                })
                .collect(),
        }
    }

    fn run_out_the_clock(engine: &mut TestSessionEngine) -> TickOutcome {
        loop {
            match engine.tick().unwrap() {
                TickOutcome::Ticked { .. } => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn start_arms_timer_from_duration() {
        let engine = free_engine();
        assert_eq!(engine.state(), EngineState::InProgress);
        assert_eq!(engine.remaining_seconds(), 300);
        assert_eq!(engine.ledger().unwrap().summary().unanswered_count, 10);
    }

    #[test]
    fn failed_start_returns_to_setup_and_keeps_config() {
        let mut engine =
            TestSessionEngine::new(EngineSettings::default(), Clock::default(), EventBus::default());
        engine.begin_start(config()).unwrap();
        engine.fail_start("no questions").unwrap();
        assert_eq!(engine.state(), EngineState::Setup);
        assert!(engine.session().is_none());
        assert!(engine.config().is_some());
    }

    #[test]
    fn free_user_is_denied_past_the_limit() {
        let mut engine = free_engine();
        let mut rx = engine.events().subscribe();
        engine.navigate(3).unwrap();

        assert_eq!(engine.navigate(5).unwrap(), Navigation::Denied);
        assert_eq!(engine.state(), EngineState::InProgress);
        assert_eq!(engine.current_index(), 3);
        assert_eq!(
            drain(&mut rx),
            vec![EngineEvent::AccessDenied {
                requested_index: 5,
                reason: AccessDeniedReason::Navigation,
            }]
        );
    }

    #[test]
    fn paid_user_navigates_everywhere() {
        let mut engine = engine_with(AccessStatus::paid(None, 5), EngineSettings::default());
        assert_eq!(engine.navigate(9).unwrap(), Navigation::Moved(9));
        assert_eq!(engine.next().unwrap(), Navigation::Boundary);
        assert_eq!(engine.previous().unwrap(), Navigation::Moved(8));
    }

    #[test]
    fn expired_payment_counts_as_free() {
        let expired = AccessStatus::paid(Some(pinned_now() - Duration::days(1)), 5);
        let mut engine = engine_with(expired, EngineSettings::default());
        assert_eq!(engine.navigate(7).unwrap(), Navigation::Denied);
    }

    #[test]
    fn answering_is_never_gated() {
        let mut engine = free_engine();
        engine.answer(8, 2).unwrap();
        assert_eq!(engine.ledger().unwrap().answer(8), Some(2));
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut engine = free_engine();
        assert!(matches!(
            engine.answer(10, 0),
            Err(SessionError::Ledger(LedgerError::IndexOutOfRange { .. }))
        ));
        assert!(engine.navigate(10).is_err());
    }

    #[test]
    fn expiry_without_access_blocks_then_upgrade_allows_submit() {
        let mut engine = free_engine();
        engine.answer(0, 0).unwrap();
        let mut rx = engine.events().subscribe();

        assert_eq!(run_out_the_clock(&mut engine), TickOutcome::ExpiredBlocked);
        assert_eq!(engine.state(), EngineState::Expired);
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::TimerExpired));
        assert!(events.contains(&EngineEvent::AccessDenied {
            requested_index: 9,
            reason: AccessDeniedReason::Expiry,
        }));

        assert_eq!(engine.begin_submit().unwrap(), SubmitStart::Denied);
        assert_eq!(engine.state(), EngineState::Expired);

        engine.update_access(AccessStatus::paid(None, 5));
        let SubmitStart::Ready(payload) = engine.begin_submit().unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(payload.answers.len(), 10);
        let ledger = engine.ledger().unwrap().clone();
        engine.complete_submit(response(&ledger)).unwrap();
        assert_eq!(engine.state(), EngineState::Complete);
        assert_eq!(engine.report().unwrap().breakdown.correct, 1);
    }

    #[test]
    fn submit_regardless_policy_submits_on_expiry() {
        let mut draft = practice_core::model::EngineSettingsDraft::new();
        draft.expiry_policy = Some(ExpiryPolicy::SubmitRegardless);
        let mut engine = engine_with(AccessStatus::free(5), draft.validate().unwrap());

        assert_eq!(run_out_the_clock(&mut engine), TickOutcome::SubmitDue);
        assert!(matches!(engine.begin_submit().unwrap(), SubmitStart::Ready(_)));
    }

    #[test]
    fn expiry_fires_once_and_ticks_stop() {
        let mut engine = engine_with(AccessStatus::admin(), EngineSettings::default());
        assert_eq!(run_out_the_clock(&mut engine), TickOutcome::SubmitDue);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Idle);
        assert!(!engine.resume_timer());
    }

    #[test]
    fn failed_submit_restores_state_and_answers() {
        let mut engine = engine_with(AccessStatus::admin(), EngineSettings::default());
        engine.answer(1, 3).unwrap();
        engine.toggle_flag(2).unwrap();
        engine.tick().unwrap();
        let before = engine.ledger().unwrap().clone();

        assert!(matches!(engine.begin_submit().unwrap(), SubmitStart::Ready(_)));
        assert_eq!(engine.begin_submit().unwrap(), SubmitStart::InFlight);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Idle);

        assert_eq!(engine.fail_submit("connection reset").unwrap(), EngineState::InProgress);
        assert_eq!(engine.ledger().unwrap(), &before);
        assert_eq!(
            engine.tick().unwrap(),
            TickOutcome::Ticked {
                remaining_seconds: 298
            }
        );
    }

    #[test]
    fn failed_submit_keeps_a_paused_timer_paused() {
        let mut engine = engine_with(AccessStatus::admin(), EngineSettings::default());
        engine.tick().unwrap();
        assert!(engine.pause_timer());
        assert_eq!(engine.tick().unwrap(), TickOutcome::Idle);

        assert!(matches!(engine.begin_submit().unwrap(), SubmitStart::Ready(_)));
        engine.fail_submit("network").unwrap();

        assert_eq!(engine.state(), EngineState::InProgress);
        assert_eq!(engine.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(engine.remaining_seconds(), 299);
        assert!(engine.resume_timer());
        assert_eq!(
            engine.tick().unwrap(),
            TickOutcome::Ticked {
                remaining_seconds: 298
            }
        );
    }

    #[test]
    fn elapsed_time_comes_from_the_wall_clock() {
        let mut engine = engine_with(AccessStatus::admin(), EngineSettings::default());
        let mut clock = engine.clock();
        clock.advance(Duration::seconds(95));
        engine.set_clock(clock);
        let SubmitStart::Ready(payload) = engine.begin_submit().unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(payload.time_spent_seconds, 95);
    }

    #[test]
    fn low_time_follows_the_ratio() {
        let mut engine = engine_with(AccessStatus::admin(), EngineSettings::default());
        for _ in 0..269 {
            engine.tick().unwrap();
        }
        assert!(!engine.is_low_on_time());
        engine.tick().unwrap();
        assert!(engine.is_low_on_time());
    }

    #[test]
    fn answers_are_locked_after_expiry() {
        let mut engine = free_engine();
        run_out_the_clock(&mut engine);
        assert_eq!(
            engine.answer(0, 1),
            Err(SessionError::NotAllowed(EngineState::Expired))
        );
    }
}
