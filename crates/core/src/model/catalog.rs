use serde::{Deserialize, Serialize};

use crate::model::ids::{SubjectId, TopicId};

/// Upper bound on the number of topics the backend will ever generate for one subject.
pub const MAX_TOPICS_PER_SUBJECT: u32 = 70;

/// A subject as listed by the backend. Never mutated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub topic_count: u32,
    pub question_count: u32,
}

/// A topic belonging to exactly one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub subject_id: SubjectId,
    pub name: String,
}

/// Pagination metadata returned alongside a page of topics.
///
/// `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_topics: u32,
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    #[must_use]
    pub fn first(page_size: u32) -> Self {
        Self {
            total_topics: 0,
            page: 1,
            page_size,
        }
    }
}

/// Accumulated topics for one subject.
///
/// Pages are appended as they are fetched; a page never shrinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPage {
    pub subject_id: SubjectId,
    pub topics: Vec<Topic>,
    pub pagination: Pagination,
}

impl TopicPage {
    #[must_use]
    pub fn empty(subject_id: SubjectId, page_size: u32) -> Self {
        Self {
            subject_id,
            topics: Vec::new(),
            pagination: Pagination::first(page_size),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Ids of every topic loaded so far, in arrival order.
    pub fn topic_ids(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.topics.iter().map(|topic| topic.id)
    }

    /// Returns true when the server reports more topics than are loaded.
    #[must_use]
    pub fn has_more(&self) -> bool {
        let loaded = u32::try_from(self.topics.len()).unwrap_or(u32::MAX);
        loaded < self.pagination.total_topics
    }

    /// The page number to request next.
    #[must_use]
    pub fn next_page(&self) -> u32 {
        if self.topics.is_empty() {
            1
        } else {
            self.pagination.page.saturating_add(1)
        }
    }

    /// Fold a freshly fetched page into this one.
    ///
    /// Topics already present (by id) are skipped and topics from another subject
    /// are ignored. Pagination metadata advances but the reported total never drops
    /// below what is already loaded.
    pub fn merge(&mut self, other: TopicPage) {
        if other.subject_id != self.subject_id {
            return;
        }
        for topic in other.topics {
            if topic.subject_id != self.subject_id {
                continue;
            }
            if self.topics.iter().all(|existing| existing.id != topic.id) {
                self.topics.push(topic);
            }
        }

        let loaded = u32::try_from(self.topics.len()).unwrap_or(u32::MAX);
        self.pagination.page = self.pagination.page.max(other.pagination.page);
        self.pagination.page_size = other.pagination.page_size;
        self.pagination.total_topics = other.pagination.total_topics.max(loaded);
    }
}
