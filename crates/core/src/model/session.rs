use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, TestSessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestSessionError {
    #[error("no questions available for the selection")]
    NoQuestions,

    #[error("session duration must be > 0 minutes")]
    InvalidDuration,

    #[error("question {index} has no options")]
    QuestionWithoutOptions { index: usize },
}

/// A server-issued multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub subject: String,
    pub topic: String,
}

/// One timed attempt at a generated set of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSession {
    id: TestSessionId,
    questions: Vec<Question>,
    duration_minutes: u32,
    free_question_limit: u32,
}

impl TestSession {
    /// Build a session from what the backend returned.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::NoQuestions` for an empty question set,
    /// `InvalidDuration` for a zero-minute session and `QuestionWithoutOptions`
    /// when a question cannot be answered.
    pub fn new(
        id: TestSessionId,
        questions: Vec<Question>,
        duration_minutes: u32,
        free_question_limit: u32,
    ) -> Result<Self, TestSessionError> {
        if questions.is_empty() {
            return Err(TestSessionError::NoQuestions);
        }
        if duration_minutes == 0 {
            return Err(TestSessionError::InvalidDuration);
        }
        if let Some(index) = questions.iter().position(|q| q.options.is_empty()) {
            return Err(TestSessionError::QuestionWithoutOptions { index });
        }

        Ok(Self {
            id,
            questions,
            duration_minutes,
            free_question_limit,
        })
    }

    #[must_use]
    pub fn id(&self) -> TestSessionId {
        self.id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    #[must_use]
    pub fn free_question_limit(&self) -> u32 {
        self.free_question_limit
    }
}
