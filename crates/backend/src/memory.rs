use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use practice_core::model::{
    AccessStatus, AnswerEntry, Pagination, Question, QuestionDetail, QuestionId, Subject,
    SubjectId, SubjectTopics, SubmissionPayload, SubmitResponse, TestConfig, TestResult,
    TestSession, TestSessionId, Topic, TopicPage,
};

use crate::client::{ApiError, PracticeBackend};

const OPTIONS_PER_QUESTION: usize = 4;

/// When a pending subject's topics become visible to `get_topics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicReadiness {
    /// Visible from the first fetch.
    Ready,
    /// Empty for the first `n` fetches that include the subject.
    AfterFetches(u32),
    /// Never generated.
    Never,
}

struct StoredSession {
    session: TestSession,
    answer_key: Vec<usize>,
    submitted: bool,
}

#[derive(Default)]
struct State {
    subjects: Vec<Subject>,
    topics: BTreeMap<SubjectId, Vec<Topic>>,
    readiness: BTreeMap<SubjectId, TopicReadiness>,
    fetches: BTreeMap<SubjectId, u32>,
    topic_failures: VecDeque<ApiError>,
    generation_requests: Vec<SubjectId>,
    access: Option<Result<AccessStatus, ApiError>>,
    free_question_limit: u32,
    question_pool: Option<u32>,
    start_failures: VecDeque<ApiError>,
    submit_failures: VecDeque<ApiError>,
    submit_delay: Option<Duration>,
    next_session_id: u64,
    sessions: BTreeMap<TestSessionId, StoredSession>,
    start_calls: usize,
    submit_calls: usize,
    topic_calls: usize,
}

/// Scriptable in-memory backend for tests and offline demos.
///
/// Clones share state, so a test can keep a handle for assertions while the
/// engine owns another.
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let state = State {
            free_question_limit: 5,
            next_session_id: 1,
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn setup(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ApiError> {
        self.state
            .lock()
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    /// Register a subject whose topics are immediately available.
    #[must_use]
    pub fn with_subject(self, subject: Subject, topics: Vec<Topic>) -> Self {
        self.with_pending_subject(subject, topics, TopicReadiness::Ready)
    }

    /// Register a subject whose topics appear only after some fetches (or never).
    #[must_use]
    pub fn with_pending_subject(
        self,
        subject: Subject,
        topics: Vec<Topic>,
        readiness: TopicReadiness,
    ) -> Self {
        {
            let mut state = self.setup();
            state.readiness.insert(subject.id, readiness);
            state.topics.insert(subject.id, topics);
            state.subjects.push(subject);
        }
        self
    }

    #[must_use]
    pub fn with_free_question_limit(self, limit: u32) -> Self {
        self.setup().free_question_limit = limit;
        self
    }

    /// Cap how many questions the server can supply. `0` means none at all.
    #[must_use]
    pub fn with_question_pool(self, available: u32) -> Self {
        self.setup().question_pool = Some(available);
        self
    }

    pub fn set_access_status(&self, status: AccessStatus) {
        self.setup().access = Some(Ok(status));
    }

    pub fn fail_access_status(&self, error: ApiError) {
        self.setup().access = Some(Err(error));
    }

    pub fn fail_next_topic_fetch(&self, error: ApiError) {
        self.setup().topic_failures.push_back(error);
    }

    pub fn fail_next_start(&self, error: ApiError) {
        self.setup().start_failures.push_back(error);
    }

    pub fn fail_next_submit(&self, error: ApiError) {
        self.setup().submit_failures.push_back(error);
    }

    /// Delay every submission by `delay` (uses tokio's clock).
    pub fn set_submit_delay(&self, delay: Duration) {
        self.setup().submit_delay = Some(delay);
    }

    /// Make a pending subject's topics visible from the next fetch on.
    pub fn mark_topics_ready(&self, subject_id: SubjectId) {
        self.setup()
            .readiness
            .insert(subject_id, TopicReadiness::Ready);
    }

    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.setup().start_calls
    }

    #[must_use]
    pub fn submit_calls(&self) -> usize {
        self.setup().submit_calls
    }

    #[must_use]
    pub fn topic_calls(&self) -> usize {
        self.setup().topic_calls
    }

    #[must_use]
    pub fn generation_requests(&self) -> Vec<SubjectId> {
        self.setup().generation_requests.clone()
    }

    /// Correct option index per question for a session the backend issued.
    #[must_use]
    pub fn answer_key(&self, session_id: TestSessionId) -> Option<Vec<usize>> {
        self.setup()
            .sessions
            .get(&session_id)
            .map(|stored| stored.answer_key.clone())
    }
}

fn visible_topics(state: &mut State, subject_id: SubjectId) -> Vec<Topic> {
    let fetches = state.fetches.entry(subject_id).or_insert(0);
    *fetches += 1;
    let visible = match state.readiness.get(&subject_id) {
        Some(TopicReadiness::Ready) => true,
        Some(TopicReadiness::AfterFetches(n)) => *fetches > *n,
        Some(TopicReadiness::Never) | None => false,
    };
    if visible {
        state.topics.get(&subject_id).cloned().unwrap_or_default()
    } else {
        Vec::new()
    }
}

fn subject_name(state: &State, subject_id: SubjectId) -> String {
    state
        .subjects
        .iter()
        .find(|s| s.id == subject_id)
        .map_or_else(|| format!("Subject {subject_id}"), |s| s.name.clone())
}

fn topic_names_for(state: &State, config: &TestConfig, subject_id: SubjectId) -> Vec<String> {
    let all = state.topics.get(&subject_id).cloned().unwrap_or_default();
    let chosen: Vec<String> = match config.topics().for_subject(subject_id) {
        SubjectTopics::All => all.into_iter().map(|t| t.name).collect(),
        SubjectTopics::Chosen(ids) => all
            .into_iter()
            .filter(|t| ids.contains(&t.id))
            .map(|t| t.name)
            .collect(),
    };
    if chosen.is_empty() {
        vec!["General".to_string()]
    } else {
        chosen
    }
}

fn build_session(state: &mut State, config: &TestConfig) -> Result<StoredSession, ApiError> {
    let requested = config.total_questions();
    let count = state.question_pool.map_or(requested, |pool| pool.min(requested));
    if count == 0 {
        return Err(ApiError::NoQuestionsAvailable);
    }

    let id = TestSessionId::new(state.next_session_id);
    state.next_session_id += 1;

    let subjects: Vec<SubjectId> = config.subject_ids().iter().copied().collect();
    let mut questions = Vec::new();
    let mut answer_key = Vec::new();
    for i in 0..count as usize {
        let subject_id = subjects[i % subjects.len()];
        let topics = topic_names_for(state, config, subject_id);
        let topic = topics[(i / subjects.len()) % topics.len()].clone();
        let question_id = id.value() * 1_000 + i as u64 + 1;
        questions.push(Question {
            id: QuestionId::new(question_id),
            text: format!("Question {} on {topic}", i + 1),
            options: (0..OPTIONS_PER_QUESTION)
                .map(|o| format!("Option {}", char::from(b'A' + o as u8)))
                .collect(),
            subject: subject_name(state, subject_id),
            topic,
        });
        answer_key.push((i * 3 + 1) % OPTIONS_PER_QUESTION);
    }

    let session = TestSession::new(
        id,
        questions,
        config.duration_minutes(),
        state.free_question_limit,
    )
    .map_err(|e| ApiError::Validation(e.to_string()))?;

    Ok(StoredSession {
        session,
        answer_key,
        submitted: false,
    })
}

#[allow(clippy::cast_precision_loss)]
fn percentage(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(total) * 100.0
    }
}

fn score(stored: &StoredSession, payload: &SubmissionPayload) -> Result<SubmitResponse, ApiError> {
    let questions = stored.session.questions();
    if payload.answers.len() != questions.len() {
        return Err(ApiError::Validation(format!(
            "expected {} answers, got {}",
            questions.len(),
            payload.answers.len()
        )));
    }

    let mut details = Vec::with_capacity(questions.len());
    let mut per_subject: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    let mut correct_answers = 0_u32;
    for ((question, key), AnswerEntry { question_id, user_answer }) in
        questions.iter().zip(&stored.answer_key).zip(&payload.answers)
    {
        if *question_id != question.id {
            return Err(ApiError::Validation(format!(
                "answer for unknown question {question_id}"
            )));
        }
        let is_correct = *user_answer == Some(*key);
        let tally = per_subject.entry(question.subject.clone()).or_insert((0, 0));
        tally.1 += 1;
        if is_correct {
            tally.0 += 1;
            correct_answers += 1;
        }
        details.push(QuestionDetail {
            question_id: question.id,
            correct_answer: *key,
            user_answer: *user_answer,
            is_correct,
            explanation: Some(format!("{} is correct.", question.options[*key])),
        });
    }

    let total_questions = u32::try_from(questions.len()).unwrap_or(u32::MAX);
    Ok(SubmitResponse {
        test_result: TestResult {
            test_id: stored.session.id(),
            score: percentage(correct_answers, total_questions),
            correct_answers,
            total_questions,
            time_spent_seconds: payload.time_spent_seconds,
            subject_scores: per_subject
                .into_iter()
                .map(|(name, (correct, total))| (name, percentage(correct, total)))
                .collect(),
        },
        questions: details,
    })
}

#[async_trait]
impl PracticeBackend for InMemoryBackend {
    async fn list_subjects(&self) -> Result<Vec<Subject>, ApiError> {
        Ok(self.lock()?.subjects.clone())
    }

    async fn get_topics(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        page: u32,
        page_size: u32,
    ) -> Result<BTreeMap<SubjectId, TopicPage>, ApiError> {
        let mut state = self.lock()?;
        state.topic_calls += 1;
        if let Some(err) = state.topic_failures.pop_front() {
            return Err(err);
        }

        let page = page.max(1);
        let size = page_size.max(1) as usize;
        let mut result = BTreeMap::new();
        for subject_id in subject_ids {
            let visible = visible_topics(&mut state, *subject_id);
            let total = u32::try_from(visible.len()).unwrap_or(u32::MAX);
            let topics = visible
                .into_iter()
                .skip((page as usize - 1) * size)
                .take(size)
                .collect();
            result.insert(
                *subject_id,
                TopicPage {
                    subject_id: *subject_id,
                    topics,
                    pagination: Pagination {
                        total_topics: total,
                        page,
                        page_size,
                    },
                },
            );
        }
        Ok(result)
    }

    async fn generate_more_topics(&self, subject_id: SubjectId) -> Result<(), ApiError> {
        let mut state = self.lock()?;
        if !state.subjects.iter().any(|s| s.id == subject_id) {
            return Err(ApiError::Validation(format!("unknown subject {subject_id}")));
        }
        state.generation_requests.push(subject_id);
        Ok(())
    }

    async fn start_test(&self, config: &TestConfig) -> Result<TestSession, ApiError> {
        let mut state = self.lock()?;
        state.start_calls += 1;
        if let Some(err) = state.start_failures.pop_front() {
            return Err(err);
        }
        let stored = build_session(&mut state, config)?;
        let session = stored.session.clone();
        state.sessions.insert(session.id(), stored);
        Ok(session)
    }

    async fn get_access_status(&self) -> Result<AccessStatus, ApiError> {
        let state = self.lock()?;
        match &state.access {
            Some(result) => result.clone(),
            None => Ok(AccessStatus::free(state.free_question_limit)),
        }
    }

    async fn submit_test(&self, payload: &SubmissionPayload) -> Result<SubmitResponse, ApiError> {
        let delay = {
            let mut state = self.lock()?;
            state.submit_calls += 1;
            state.submit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock()?;
        if let Some(err) = state.submit_failures.pop_front() {
            return Err(err);
        }
        let stored = state
            .sessions
            .get_mut(&payload.session_id)
            .ok_or(ApiError::SessionExpired)?;
        if stored.submitted {
            return Err(ApiError::Validation("test already submitted".into()));
        }
        let response = score(stored, payload)?;
        stored.submitted = true;
        Ok(response)
    }

    async fn download_test_pdf(&self, test_id: TestSessionId) -> Result<Vec<u8>, ApiError> {
        let state = self.lock()?;
        let stored = state.sessions.get(&test_id).ok_or(ApiError::Status {
            status: 404,
            message: format!("test {test_id} not found"),
        })?;
        if !stored.submitted {
            return Err(ApiError::Validation("test has not been submitted".into()));
        }
        let paid = match &state.access {
            Some(Ok(status)) => status.is_admin() || status.has_paid,
            _ => false,
        };
        if !paid {
            return Err(ApiError::PaymentRequired);
        }
        Ok(format!("%PDF-1.4\n% practice test {test_id}\n").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::{Difficulty, TopicId, TopicScope};

    fn subject(id: u64, name: &str) -> Subject {
        Subject {
            id: SubjectId::new(id),
            name: name.into(),
            topic_count: 0,
            question_count: 0,
        }
    }

    fn topics(subject: u64, count: u64) -> Vec<Topic> {
        (1..=count)
            .map(|i| Topic {
                id: TopicId::new(subject * 100 + i),
                subject_id: SubjectId::new(subject),
                name: format!("T{subject}-{i}"),
            })
            .collect()
    }

    fn config(subjects: &[u64], questions: u32) -> TestConfig {
        TestConfig::new(
            subjects.iter().copied().map(SubjectId::new).collect(),
            TopicScope::Random,
            Difficulty::Easy,
            questions,
            30,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn unrestricted_subject_draws_from_every_topic() {
        let backend = InMemoryBackend::new()
            .with_subject(subject(1, "Math"), topics(1, 30))
            .with_subject(subject(2, "Art"), topics(2, 3));
        let config = TestConfig::new(
            BTreeSet::from([SubjectId::new(1), SubjectId::new(2)]),
            TopicScope::PerSubject(BTreeMap::from([(
                SubjectId::new(2),
                SubjectTopics::Chosen(BTreeSet::from([TopicId::new(202)])),
            )])),
            Difficulty::Easy,
            60,
            30,
        )
        .unwrap();

        let session = backend.start_test(&config).await.unwrap();
        let math: BTreeSet<&str> = session
            .questions()
            .iter()
            .filter(|q| q.subject == "Math")
            .map(|q| q.topic.as_str())
            .collect();
        let art: BTreeSet<&str> = session
            .questions()
            .iter()
            .filter(|q| q.subject == "Art")
            .map(|q| q.topic.as_str())
            .collect();
        assert_eq!(math.len(), 30);
        assert_eq!(art, BTreeSet::from(["T2-2"]));
    }

    #[tokio::test]
    async fn pages_topics() {
        let backend = InMemoryBackend::new().with_subject(subject(1, "Math"), topics(1, 5));
        let ids = BTreeSet::from([SubjectId::new(1)]);

        let first = backend.get_topics(&ids, 1, 2).await.unwrap();
        let page = &first[&SubjectId::new(1)];
        assert_eq!(page.topics.len(), 2);
        assert_eq!(page.pagination.total_topics, 5);

        let third = backend.get_topics(&ids, 3, 2).await.unwrap();
        assert_eq!(third[&SubjectId::new(1)].topics.len(), 1);
    }

    #[tokio::test]
    async fn pending_subject_appears_after_fetches() {
        let backend = InMemoryBackend::new().with_pending_subject(
            subject(2, "Biology"),
            topics(2, 3),
            TopicReadiness::AfterFetches(2),
        );
        let ids = BTreeSet::from([SubjectId::new(2)]);

        for _ in 0..2 {
            let pages = backend.get_topics(&ids, 1, 10).await.unwrap();
            assert!(pages[&SubjectId::new(2)].is_empty());
        }
        let pages = backend.get_topics(&ids, 1, 10).await.unwrap();
        assert_eq!(pages[&SubjectId::new(2)].len(), 3);
    }

    #[tokio::test]
    async fn start_test_honors_question_count_and_pool() {
        let backend = InMemoryBackend::new().with_subject(subject(1, "Math"), topics(1, 2));
        let session = backend.start_test(&config(&[1], 20)).await.unwrap();
        assert_eq!(session.len(), 20);
        assert_eq!(session.duration_minutes(), 30);

        let empty = InMemoryBackend::new()
            .with_subject(subject(1, "Math"), topics(1, 2))
            .with_question_pool(0);
        assert_eq!(
            empty.start_test(&config(&[1], 20)).await.unwrap_err(),
            ApiError::NoQuestionsAvailable
        );
    }

    #[tokio::test]
    async fn scores_submission_against_key() {
        let backend = InMemoryBackend::new().with_subject(subject(1, "Math"), topics(1, 2));
        let session = backend.start_test(&config(&[1], 4)).await.unwrap();
        let key = backend.answer_key(session.id()).unwrap();

        let answers = session
            .questions()
            .iter()
            .enumerate()
            .map(|(i, q)| AnswerEntry {
                question_id: q.id,
                user_answer: if i < 2 { Some(key[i]) } else { None },
            })
            .collect();
        let response = backend
            .submit_test(&SubmissionPayload {
                session_id: session.id(),
                answers,
                time_spent_seconds: 90,
            })
            .await
            .unwrap();

        assert_eq!(response.test_result.correct_answers, 2);
        assert_eq!(response.test_result.total_questions, 4);
        assert!((response.test_result.score - 50.0).abs() < f64::EPSILON);
        assert_eq!(response.questions.len(), 4);
        assert_eq!(backend.submit_calls(), 1);
    }

    #[tokio::test]
    async fn pdf_requires_payment() {
        let backend = InMemoryBackend::new().with_subject(subject(1, "Math"), topics(1, 2));
        let session = backend.start_test(&config(&[1], 1)).await.unwrap();
        let answers = vec![AnswerEntry {
            question_id: session.questions()[0].id,
            user_answer: None,
        }];
        backend
            .submit_test(&SubmissionPayload {
                session_id: session.id(),
                answers,
                time_spent_seconds: 1,
            })
            .await
            .unwrap();

        assert_eq!(
            backend.download_test_pdf(session.id()).await.unwrap_err(),
            ApiError::PaymentRequired
        );
        backend.set_access_status(AccessStatus::paid(None, 5));
        let pdf = backend.download_test_pdf(session.id()).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
