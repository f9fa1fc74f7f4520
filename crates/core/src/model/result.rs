use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, TestSessionId};

/// One entry of a submission. `user_answer` is `None` for a skipped question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub user_answer: Option<usize>,
}

/// Everything the backend needs to score an attempt.
///
/// `answers` holds one entry per session question, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub session_id: TestSessionId,
    pub answers: Vec<AnswerEntry>,
    pub time_spent_seconds: u64,
}

/// Server-computed score for a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: TestSessionId,
    /// Percentage in `[0, 100]`.
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub time_spent_seconds: u64,
    /// Percentage score keyed by subject name.
    pub subject_scores: BTreeMap<String, f64>,
}

/// Resolved correctness for a single question, as returned after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDetail {
    pub question_id: QuestionId,
    pub correct_answer: usize,
    pub user_answer: Option<usize>,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub test_result: TestResult,
    pub questions: Vec<QuestionDetail>,
}
