mod poller;
mod service;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use practice_core::model::{Subject, SubjectId, TopicId, TopicPage};

pub use poller::TopicGenerationPoller;
pub use service::TopicCatalogService;

/// Catalog shared between the catalog service, the poller and the config builder.
pub type SharedCatalog = Arc<RwLock<TopicCatalog>>;

/// Subjects and the topic pages loaded for them so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicCatalog {
    subjects: Vec<Subject>,
    pages: BTreeMap<SubjectId, TopicPage>,
}

impl TopicCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    #[must_use]
    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    #[must_use]
    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    /// Replace the subject list. Pages for subjects that disappeared are dropped.
    pub fn set_subjects(&mut self, subjects: Vec<Subject>) {
        let known: BTreeSet<SubjectId> = subjects.iter().map(|s| s.id).collect();
        self.pages.retain(|id, _| known.contains(id));
        self.subjects = subjects;
    }

    #[must_use]
    pub fn page(&self, subject_id: SubjectId) -> Option<&TopicPage> {
        self.pages.get(&subject_id)
    }

    #[must_use]
    pub fn topic_ids(&self, subject_id: SubjectId) -> BTreeSet<TopicId> {
        self.pages
            .get(&subject_id)
            .map(|page| page.topic_ids().collect())
            .unwrap_or_default()
    }

    /// Topics the server reports for a subject, loaded or not.
    #[must_use]
    pub fn known_topic_count(&self, subject_id: SubjectId) -> u32 {
        self.pages.get(&subject_id).map_or(0, |page| {
            let loaded = u32::try_from(page.len()).unwrap_or(u32::MAX);
            page.pagination.total_topics.max(loaded)
        })
    }

    pub fn merge_page(&mut self, page: TopicPage) {
        match self.pages.get_mut(&page.subject_id) {
            Some(existing) => existing.merge(page),
            None => {
                self.pages.insert(page.subject_id, page);
            }
        }
    }

    /// Subjects from `ids` that have no topics loaded yet.
    #[must_use]
    pub fn subjects_without_topics(&self, ids: &BTreeSet<SubjectId>) -> BTreeSet<SubjectId> {
        ids.iter()
            .copied()
            .filter(|id| self.pages.get(id).is_none_or(TopicPage::is_empty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::{Pagination, Topic};

    fn subject(id: u64) -> Subject {
        Subject {
            id: SubjectId::new(id),
            name: format!("Subject {id}"),
            topic_count: 0,
            question_count: 0,
        }
    }

    fn page(subject: u64, ids: &[u64], total: u32, page: u32) -> TopicPage {
        TopicPage {
            subject_id: SubjectId::new(subject),
            topics: ids
                .iter()
                .map(|id| Topic {
                    id: TopicId::new(*id),
                    subject_id: SubjectId::new(subject),
                    name: format!("Topic {id}"),
                })
                .collect(),
            pagination: Pagination {
                total_topics: total,
                page,
                page_size: 2,
            },
        }
    }

    #[test]
    fn merge_appends_pages() {
        let mut catalog = TopicCatalog::new();
        catalog.merge_page(page(1, &[10, 11], 3, 1));
        catalog.merge_page(page(1, &[12], 3, 2));

        assert_eq!(
            catalog.topic_ids(SubjectId::new(1)),
            BTreeSet::from([TopicId::new(10), TopicId::new(11), TopicId::new(12)])
        );
        assert!(!catalog.page(SubjectId::new(1)).unwrap().has_more());
    }

    #[test]
    fn reports_subjects_still_waiting_for_topics() {
        let mut catalog = TopicCatalog::new();
        catalog.merge_page(page(1, &[10], 1, 1));
        catalog.merge_page(page(2, &[], 0, 1));

        let ids = BTreeSet::from([SubjectId::new(1), SubjectId::new(2), SubjectId::new(3)]);
        assert_eq!(
            catalog.subjects_without_topics(&ids),
            BTreeSet::from([SubjectId::new(2), SubjectId::new(3)])
        );
    }

    #[test]
    fn replacing_subjects_drops_stale_pages() {
        let mut catalog = TopicCatalog::new();
        catalog.set_subjects(vec![subject(1), subject(2)]);
        catalog.merge_page(page(1, &[10], 1, 1));
        catalog.merge_page(page(2, &[20], 1, 1));

        catalog.set_subjects(vec![subject(2)]);
        assert!(catalog.page(SubjectId::new(1)).is_none());
        assert_eq!(catalog.known_topic_count(SubjectId::new(2)), 1);
        assert!(catalog.subject(SubjectId::new(1)).is_none());
    }
}
