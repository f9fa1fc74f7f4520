use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{SubjectId, TopicId};

/// Allowed number of questions in one test.
pub const QUESTION_COUNT_RANGE: RangeInclusive<u32> = 1..=100;

/// Allowed test duration in minutes.
pub const DURATION_MINUTES_RANGE: RangeInclusive<u32> = 5..=300;

/// Maximum number of subjects that may be combined in one test.
pub const MAX_SUBJECTS_PER_TEST: usize = 5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestConfigError {
    #[error("at least one subject must be selected")]
    EmptySelection,

    #[error("at most {MAX_SUBJECTS_PER_TEST} subjects can be combined, got {count}")]
    TooManySubjects { count: usize },

    #[error("question count must be between 1 and 100, got {value}")]
    QuestionCountOutOfRange { value: u32 },

    #[error("duration must be between 5 and 300 minutes, got {value}")]
    DurationOutOfRange { value: u32 },
}

/// Validation failures surfaced before any network call is made.
pub type ValidationError = TestConfigError;

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Topic restriction for one subject of a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectTopics {
    /// No topic was picked, so every topic of the subject is in play,
    /// including pages the client never loaded. An empty pick is not "no topics".
    All,
    Chosen(BTreeSet<TopicId>),
}

impl SubjectTopics {
    /// `All` for an empty pick, `Chosen` otherwise.
    #[must_use]
    pub fn from_pick(picked: BTreeSet<TopicId>) -> Self {
        if picked.is_empty() {
            SubjectTopics::All
        } else {
            SubjectTopics::Chosen(picked)
        }
    }
}

/// Which topics the server may draw questions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicScope {
    /// The server chooses topics.
    Random,
    /// Each selected subject carries its own restriction.
    PerSubject(BTreeMap<SubjectId, SubjectTopics>),
}

impl TopicScope {
    #[must_use]
    pub fn is_random(&self) -> bool {
        matches!(self, TopicScope::Random)
    }

    /// Restriction for one subject. `Random` restricts nothing.
    #[must_use]
    pub fn for_subject(&self, subject_id: SubjectId) -> SubjectTopics {
        match self {
            TopicScope::Random => SubjectTopics::All,
            TopicScope::PerSubject(by_subject) => by_subject
                .get(&subject_id)
                .cloned()
                .unwrap_or(SubjectTopics::All),
        }
    }

    /// Every explicitly picked topic id across subjects.
    #[must_use]
    pub fn chosen_topic_ids(&self) -> BTreeSet<TopicId> {
        match self {
            TopicScope::Random => BTreeSet::new(),
            TopicScope::PerSubject(by_subject) => by_subject
                .values()
                .filter_map(|topics| match topics {
                    SubjectTopics::Chosen(ids) => Some(ids.iter().copied()),
                    SubjectTopics::All => None,
                })
                .flatten()
                .collect(),
        }
    }
}

/// A validated, immutable request for one test attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    subject_ids: BTreeSet<SubjectId>,
    topics: TopicScope,
    difficulty: Difficulty,
    total_questions: u32,
    duration_minutes: u32,
}

impl TestConfig {
    /// Validate and assemble a config.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule in this order: subject selection, subject
    /// count, question count, duration.
    ///
    /// A per-subject scope is aligned with `subject_ids`: entries for subjects
    /// not in the test are dropped and missing subjects get `SubjectTopics::All`.
    pub fn new(
        subject_ids: BTreeSet<SubjectId>,
        topics: TopicScope,
        difficulty: Difficulty,
        total_questions: u32,
        duration_minutes: u32,
    ) -> Result<Self, TestConfigError> {
        if subject_ids.is_empty() {
            return Err(TestConfigError::EmptySelection);
        }
        if subject_ids.len() > MAX_SUBJECTS_PER_TEST {
            return Err(TestConfigError::TooManySubjects {
                count: subject_ids.len(),
            });
        }
        if !QUESTION_COUNT_RANGE.contains(&total_questions) {
            return Err(TestConfigError::QuestionCountOutOfRange {
                value: total_questions,
            });
        }
        if !DURATION_MINUTES_RANGE.contains(&duration_minutes) {
            return Err(TestConfigError::DurationOutOfRange {
                value: duration_minutes,
            });
        }

        let topics = match topics {
            TopicScope::Random => TopicScope::Random,
            TopicScope::PerSubject(mut by_subject) => TopicScope::PerSubject(
                subject_ids
                    .iter()
                    .map(|id| (*id, by_subject.remove(id).unwrap_or(SubjectTopics::All)))
                    .collect(),
            ),
        };

        Ok(Self {
            subject_ids,
            topics,
            difficulty,
            total_questions,
            duration_minutes,
        })
    }

    #[must_use]
    pub fn subject_ids(&self) -> &BTreeSet<SubjectId> {
        &self.subject_ids
    }

    #[must_use]
    pub fn topics(&self) -> &TopicScope {
        &self.topics
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subjects(ids: &[u64]) -> BTreeSet<SubjectId> {
        ids.iter().copied().map(SubjectId::new).collect()
    }

    #[test]
    fn accepts_boundaries() {
        assert!(TestConfig::new(subjects(&[1]), TopicScope::Random, Difficulty::Easy, 1, 5).is_ok());
        assert!(
            TestConfig::new(subjects(&[1, 2, 3, 4, 5]), TopicScope::Random, Difficulty::Hard, 100, 300)
                .is_ok()
        );
    }

    #[test]
    fn rejects_empty_subjects() {
        let err = TestConfig::new(BTreeSet::new(), TopicScope::Random, Difficulty::Easy, 10, 30)
            .unwrap_err();
        assert_eq!(err, TestConfigError::EmptySelection);
    }

    #[test]
    fn rejects_more_than_five_subjects() {
        let err = TestConfig::new(
            subjects(&[1, 2, 3, 4, 5, 6]),
            TopicScope::Random,
            Difficulty::Easy,
            10,
            30,
        )
        .unwrap_err();
        assert_eq!(err, TestConfigError::TooManySubjects { count: 6 });
    }

    #[test]
    fn rejects_question_count_outside_range() {
        for value in [0, 101] {
            let err = TestConfig::new(subjects(&[1]), TopicScope::Random, Difficulty::Easy, value, 30)
                .unwrap_err();
            assert_eq!(err, TestConfigError::QuestionCountOutOfRange { value });
        }
    }

    #[test]
    fn rejects_duration_outside_range() {
        for value in [4, 301] {
            let err = TestConfig::new(subjects(&[1]), TopicScope::Random, Difficulty::Easy, 10, value)
                .unwrap_err();
            assert_eq!(err, TestConfigError::DurationOutOfRange { value });
        }
    }

    #[test]
    fn per_subject_scope_follows_the_subject_list() {
        let scope = TopicScope::PerSubject(BTreeMap::from([
            (SubjectId::new(2), SubjectTopics::Chosen(BTreeSet::from([TopicId::new(22)]))),
            (SubjectId::new(7), SubjectTopics::Chosen(BTreeSet::from([TopicId::new(71)]))),
        ]));
        let config = TestConfig::new(subjects(&[1, 2]), scope, Difficulty::Easy, 10, 30).unwrap();

        assert_eq!(config.topics().for_subject(SubjectId::new(1)), SubjectTopics::All);
        assert_eq!(
            config.topics().chosen_topic_ids(),
            BTreeSet::from([TopicId::new(22)])
        );
        let TopicScope::PerSubject(by_subject) = config.topics() else {
            panic!("expected a per-subject scope");
        };
        assert_eq!(by_subject.keys().copied().collect::<BTreeSet<_>>(), subjects(&[1, 2]));
    }

    #[test]
    fn empty_pick_is_all_topics() {
        assert_eq!(SubjectTopics::from_pick(BTreeSet::new()), SubjectTopics::All);
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Difficulty::Hard).unwrap(), "\"hard\"");
    }
}
