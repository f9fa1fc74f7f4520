use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::session::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("question index {index} is out of range (session has {len} questions)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("option {option} is out of range for question {index} ({len} options)")]
    OptionOutOfRange {
        index: usize,
        option: usize,
        len: usize,
    },
}

/// Counts derived from the ledger, useful for the question palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub answered_count: usize,
    pub unanswered_count: usize,
    pub flagged_count: usize,
    pub bookmarked_count: usize,
}

/// Per-question answer, flag and bookmark state for one session.
///
/// Every key is a valid question index; the ledger is sized from the session's
/// questions and refuses anything outside them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerLedger {
    option_counts: Vec<usize>,
    answers: BTreeMap<usize, usize>,
    flagged: BTreeSet<usize>,
    bookmarked: BTreeSet<usize>,
}

impl AnswerLedger {
    #[must_use]
    pub fn for_questions(questions: &[Question]) -> Self {
        Self {
            option_counts: questions.iter().map(|q| q.options.len()).collect(),
            answers: BTreeMap::new(),
            flagged: BTreeSet::new(),
            bookmarked: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.option_counts.len()
    }

    fn check_index(&self, index: usize) -> Result<(), LedgerError> {
        if index < self.option_counts.len() {
            Ok(())
        } else {
            Err(LedgerError::IndexOutOfRange {
                index,
                len: self.option_counts.len(),
            })
        }
    }

    /// Record (or replace) the chosen option for a question.
    ///
    /// Flag and bookmark state for the index are left alone.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the question or option index is out of range.
    pub fn set_answer(&mut self, index: usize, option: usize) -> Result<(), LedgerError> {
        self.check_index(index)?;
        let len = self.option_counts[index];
        if option >= len {
            return Err(LedgerError::OptionOutOfRange { index, option, len });
        }
        self.answers.insert(index, option);
        Ok(())
    }

    /// Remove the answer for a question, returning the previous choice.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::IndexOutOfRange` for an invalid index.
    pub fn clear_answer(&mut self, index: usize) -> Result<Option<usize>, LedgerError> {
        self.check_index(index)?;
        Ok(self.answers.remove(&index))
    }

    /// Toggle the review flag; returns whether the question is now flagged.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::IndexOutOfRange` for an invalid index.
    pub fn toggle_flag(&mut self, index: usize) -> Result<bool, LedgerError> {
        self.check_index(index)?;
        Ok(toggle(&mut self.flagged, index))
    }

    /// Toggle the bookmark; returns whether the question is now bookmarked.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::IndexOutOfRange` for an invalid index.
    pub fn toggle_bookmark(&mut self, index: usize) -> Result<bool, LedgerError> {
        self.check_index(index)?;
        Ok(toggle(&mut self.bookmarked, index))
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<usize> {
        self.answers.get(&index).copied()
    }

    #[must_use]
    pub fn is_flagged(&self, index: usize) -> bool {
        self.flagged.contains(&index)
    }

    #[must_use]
    pub fn is_bookmarked(&self, index: usize) -> bool {
        self.bookmarked.contains(&index)
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, usize> {
        &self.answers
    }

    #[must_use]
    pub fn flagged(&self) -> &BTreeSet<usize> {
        &self.flagged
    }

    #[must_use]
    pub fn bookmarked(&self) -> &BTreeSet<usize> {
        &self.bookmarked
    }

    #[must_use]
    pub fn summary(&self) -> LedgerSummary {
        let answered_count = self.answers.len();
        LedgerSummary {
            answered_count,
            unanswered_count: self.option_counts.len().saturating_sub(answered_count),
            flagged_count: self.flagged.len(),
            bookmarked_count: self.bookmarked.len(),
        }
    }
}

fn toggle(set: &mut BTreeSet<usize>, index: usize) -> bool {
    if set.remove(&index) {
        false
    } else {
        set.insert(index);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;

    fn ledger(questions: usize) -> AnswerLedger {
        let questions: Vec<_> = (0..questions)
            .map(|i| Question {
                id: QuestionId::new(i as u64 + 1),
                text: format!("Q{i}"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                subject: "Math".into(),
                topic: "Algebra".into(),
            })
            .collect();
        AnswerLedger::for_questions(&questions)
    }

    #[test]
    fn overwriting_an_answer_keeps_flag_and_bookmark() {
        let mut ledger = ledger(3);
        ledger.set_answer(1, 0).unwrap();
        assert!(ledger.toggle_flag(1).unwrap());
        assert!(ledger.toggle_bookmark(1).unwrap());

        ledger.set_answer(1, 3).unwrap();

        assert_eq!(ledger.answer(1), Some(3));
        assert!(ledger.is_flagged(1));
        assert!(ledger.is_bookmarked(1));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let mut ledger = ledger(2);
        assert_eq!(
            ledger.set_answer(2, 0),
            Err(LedgerError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            ledger.set_answer(0, 4),
            Err(LedgerError::OptionOutOfRange {
                index: 0,
                option: 4,
                len: 4
            })
        );
        assert!(ledger.toggle_flag(5).is_err());
        assert!(ledger.toggle_bookmark(5).is_err());
        assert!(ledger.answers().is_empty());
    }

    #[test]
    fn toggles_flip_back() {
        let mut ledger = ledger(1);
        assert!(ledger.toggle_flag(0).unwrap());
        assert!(!ledger.toggle_flag(0).unwrap());
        assert!(!ledger.is_flagged(0));
    }

    #[test]
    fn summary_counts_answered_and_unanswered() {
        let mut ledger = ledger(5);
        ledger.set_answer(0, 1).unwrap();
        ledger.set_answer(3, 2).unwrap();
        ledger.set_answer(3, 0).unwrap();
        ledger.toggle_flag(4).unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.answered_count, 2);
        assert_eq!(summary.unanswered_count, 3);
        assert_eq!(summary.flagged_count, 1);
        assert_eq!(summary.bookmarked_count, 0);
    }

    #[test]
    fn clear_answer_returns_previous_choice() {
        let mut ledger = ledger(2);
        ledger.set_answer(0, 2).unwrap();
        assert_eq!(ledger.clear_answer(0).unwrap(), Some(2));
        assert_eq!(ledger.clear_answer(0).unwrap(), None);
        assert_eq!(ledger.summary().answered_count, 0);
    }
}
