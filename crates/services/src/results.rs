//! Submission payloads and scored-result reconciliation.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use backend::PracticeBackend;
use practice_core::model::{
    AnswerEntry, AnswerLedger, Question, QuestionDetail, SubmissionPayload, SubmitResponse,
    TestResult, TestSession, TestSessionId,
};

use crate::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    Skipped,
    /// The server returned no detail for this question.
    Unscored,
}

/// One question as shown on the review screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewedQuestion {
    pub index: usize,
    pub question: Question,
    pub user_answer: Option<usize>,
    pub correct_answer: Option<usize>,
    pub outcome: QuestionOutcome,
    pub explanation: Option<String>,
    pub flagged: bool,
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultBreakdown {
    pub correct: usize,
    pub incorrect: usize,
    pub skipped: usize,
    pub unscored: usize,
}

impl ResultBreakdown {
    fn record(&mut self, outcome: QuestionOutcome) {
        match outcome {
            QuestionOutcome::Correct => self.correct += 1,
            QuestionOutcome::Incorrect => self.incorrect += 1,
            QuestionOutcome::Skipped => self.skipped += 1,
            QuestionOutcome::Unscored => self.unscored += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubjectBreakdown {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultReport {
    pub result: TestResult,
    pub questions: Vec<ReviewedQuestion>,
    pub breakdown: ResultBreakdown,
    pub per_subject: BTreeMap<String, SubjectBreakdown>,
}

pub struct ResultCompiler;

impl ResultCompiler {
    /// One entry per question, in question order, `None` for anything unanswered.
    #[must_use]
    pub fn build_payload(
        session: &TestSession,
        ledger: &AnswerLedger,
        time_spent_seconds: u64,
    ) -> SubmissionPayload {
        let answers = session
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| AnswerEntry {
                question_id: question.id,
                user_answer: ledger.answer(index),
            })
            .collect();
        SubmissionPayload {
            session_id: session.id(),
            answers,
            time_spent_seconds,
        }
    }

    /// Merge the server's scoring with what the user actually answered.
    ///
    /// The local ledger is authoritative for the user's answers; the server is
    /// authoritative for the correct option.
    #[must_use]
    pub fn reconcile(
        session: &TestSession,
        ledger: &AnswerLedger,
        response: SubmitResponse,
    ) -> ResultReport {
        let details: HashMap<_, QuestionDetail> = response
            .questions
            .into_iter()
            .map(|detail| (detail.question_id, detail))
            .collect();

        let mut breakdown = ResultBreakdown::default();
        let mut per_subject: BTreeMap<String, SubjectBreakdown> = BTreeMap::new();
        let mut questions = Vec::with_capacity(session.len());

        for (index, question) in session.questions().iter().enumerate() {
            let user_answer = ledger.answer(index);
            let detail = details.get(&question.id);
            if let Some(detail) = detail.filter(|d| d.user_answer != user_answer) {
                warn!(
                    question_id = %question.id,
                    local = ?user_answer,
                    server = ?detail.user_answer,
                    "server echoed a different answer, keeping the local one"
                );
            }

            let outcome = match (detail, user_answer) {
                (None, _) => QuestionOutcome::Unscored,
                (Some(_), None) => QuestionOutcome::Skipped,
                (Some(detail), Some(answer)) if answer == detail.correct_answer => {
                    QuestionOutcome::Correct
                }
                (Some(_), Some(_)) => QuestionOutcome::Incorrect,
            };
            breakdown.record(outcome);

            let subject = per_subject.entry(question.subject.clone()).or_default();
            subject.total += 1;
            if user_answer.is_some() {
                subject.answered += 1;
            }
            if outcome == QuestionOutcome::Correct {
                subject.correct += 1;
            }

            questions.push(ReviewedQuestion {
                index,
                question: question.clone(),
                user_answer,
                correct_answer: detail.map(|d| d.correct_answer),
                outcome,
                explanation: detail.and_then(|d| d.explanation.clone()),
                flagged: ledger.is_flagged(index),
                bookmarked: ledger.is_bookmarked(index),
            });
        }

        ResultReport {
            result: response.test_result,
            questions,
            breakdown,
            per_subject,
        }
    }
}

/// Fetch the PDF export of a scored test.
///
/// # Errors
///
/// Returns `DownloadError::RequiresPayment` when the export is a paid feature for
/// this user and `DownloadError::Failed` for anything else.
pub async fn download_pdf(
    backend: &dyn PracticeBackend,
    test_id: TestSessionId,
) -> Result<Vec<u8>, DownloadError> {
    let bytes = backend.download_test_pdf(test_id).await?;
    Ok(bytes)
}
