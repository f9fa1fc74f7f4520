//! Turns what the user picked on the setup screen into a validated `TestConfig`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use practice_core::model::{
    Difficulty, SubjectId, SubjectTopics, TestConfig, TestConfigError, TopicId, TopicScope,
};

pub const DEFAULT_TOTAL_QUESTIONS: u32 = 20;
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Mutable setup-screen state. Nothing here is validated until `build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSelection {
    pub subjects: BTreeSet<SubjectId>,
    pub topics_by_subject: BTreeMap<SubjectId, BTreeSet<TopicId>>,
    pub random_topics: bool,
    pub difficulty: Difficulty,
    pub total_questions: u32,
    pub duration_minutes: u32,
}

impl Default for TestSelection {
    fn default() -> Self {
        Self {
            subjects: BTreeSet::new(),
            topics_by_subject: BTreeMap::new(),
            random_topics: false,
            difficulty: Difficulty::Medium,
            total_questions: DEFAULT_TOTAL_QUESTIONS,
            duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }
}

impl TestSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the subject is selected after the toggle.
    pub fn toggle_subject(&mut self, subject_id: SubjectId) -> bool {
        if self.subjects.remove(&subject_id) {
            false
        } else {
            self.subjects.insert(subject_id);
            true
        }
    }

    /// Returns true if the topic is selected after the toggle.
    pub fn toggle_topic(&mut self, subject_id: SubjectId, topic_id: TopicId) -> bool {
        let chosen = self.topics_by_subject.entry(subject_id).or_default();
        let selected = if chosen.remove(&topic_id) {
            false
        } else {
            chosen.insert(topic_id);
            true
        };
        if chosen.is_empty() {
            self.topics_by_subject.remove(&subject_id);
        }
        selected
    }
}

pub struct TestConfigBuilder;

impl TestConfigBuilder {
    /// The restriction a selected subject contributes. An empty pick is
    /// `SubjectTopics::All`, never "no topics".
    #[must_use]
    pub fn subject_topics(selection: &TestSelection, subject_id: SubjectId) -> SubjectTopics {
        selection
            .topics_by_subject
            .get(&subject_id)
            .map_or(SubjectTopics::All, |picked| {
                SubjectTopics::from_pick(picked.clone())
            })
    }

    /// Build the config for a selection.
    ///
    /// Topics picked under a subject that is no longer selected are ignored.
    /// `All` subjects stay unrestricted on the wire; they are never expanded
    /// from whatever pages happen to be cached.
    ///
    /// # Errors
    ///
    /// Returns `TestConfigError` when the selection breaks a config rule.
    pub fn build(selection: &TestSelection) -> Result<TestConfig, TestConfigError> {
        let topics = if selection.random_topics {
            TopicScope::Random
        } else {
            let by_subject: BTreeMap<SubjectId, SubjectTopics> = selection
                .subjects
                .iter()
                .map(|id| (*id, Self::subject_topics(selection, *id)))
                .collect();
            debug!(?by_subject, "resolved topic scope");
            TopicScope::PerSubject(by_subject)
        };

        TestConfig::new(
            selection.subjects.clone(),
            topics,
            selection.difficulty,
            selection.total_questions,
            selection.duration_minutes,
        )
    }
}
