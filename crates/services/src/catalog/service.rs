use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use backend::PracticeBackend;
use practice_core::model::{EngineSettings, MAX_TOPICS_PER_SUBJECT, Subject, SubjectId, TopicPage};

use crate::cancel::CancellationToken;
use crate::catalog::{SharedCatalog, TopicCatalog, TopicGenerationPoller};
use crate::error::CatalogError;
use crate::events::EventBus;

/// Loads subjects and topics into the shared catalog.
#[derive(Clone)]
pub struct TopicCatalogService {
    backend: Arc<dyn PracticeBackend>,
    catalog: SharedCatalog,
    events: EventBus,
    settings: EngineSettings,
}

impl TopicCatalogService {
    #[must_use]
    pub fn new(backend: Arc<dyn PracticeBackend>, events: EventBus, settings: EngineSettings) -> Self {
        Self {
            backend,
            catalog: TopicCatalog::new().shared(),
            events,
            settings,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> SharedCatalog {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn poller(&self) -> TopicGenerationPoller {
        TopicGenerationPoller::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.catalog),
            self.events.clone(),
            &self.settings,
        )
    }

    /// Reload the subject list.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoSubjects` when the server has none, or
    /// `CatalogError::Api` on transport failures.
    pub async fn refresh_subjects(&self) -> Result<Vec<Subject>, CatalogError> {
        let subjects = self.backend.list_subjects().await?;
        if subjects.is_empty() {
            return Err(CatalogError::NoSubjects);
        }
        debug!(count = subjects.len(), "subjects loaded");
        self.catalog.write().await.set_subjects(subjects.clone());
        Ok(subjects)
    }

    /// Fetch the first topic page for each subject and return the ones that came
    /// back empty (their topics are still being generated).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` on transport failures.
    pub async fn load_topics(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
    ) -> Result<BTreeSet<SubjectId>, CatalogError> {
        if subject_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let pages = self
            .backend
            .get_topics(subject_ids, 1, self.settings.topic_page_size())
            .await?;

        let mut catalog = self.catalog.write().await;
        for (subject_id, page) in pages {
            if subject_ids.contains(&subject_id) {
                catalog.merge_page(page);
            }
        }
        let empty = catalog.subjects_without_topics(subject_ids);
        debug!(requested = subject_ids.len(), empty = empty.len(), "topics loaded");
        Ok(empty)
    }

    /// Load the next topic page for one subject. Returns `false` when every topic
    /// is already loaded.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` on transport failures.
    pub async fn load_next_page(&self, subject_id: SubjectId) -> Result<bool, CatalogError> {
        let next = {
            let catalog = self.catalog.read().await;
            match catalog.page(subject_id) {
                Some(page) if !page.has_more() => return Ok(false),
                Some(page) => page.next_page(),
                None => 1,
            }
        };

        let page_size = self.settings.topic_page_size();
        let subject_ids = BTreeSet::from([subject_id]);
        let mut pages = self.backend.get_topics(&subject_ids, next, page_size).await?;
        let page = pages
            .remove(&subject_id)
            .unwrap_or_else(|| TopicPage::empty(subject_id, page_size));
        if page.is_empty() {
            return Ok(false);
        }

        let mut catalog = self.catalog.write().await;
        catalog.merge_page(page);
        debug!(%subject_id, page = next, "topic page loaded");
        Ok(true)
    }

    /// Ask the server to generate more topics for a subject.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownSubject` for subjects not in the catalog,
    /// `CatalogError::TopicCapReached` once the subject has the maximum number
    /// of topics, or `CatalogError::Api` if the server refuses.
    pub async fn request_more_topics(&self, subject_id: SubjectId) -> Result<(), CatalogError> {
        {
            let catalog = self.catalog.read().await;
            if catalog.subject(subject_id).is_none() {
                return Err(CatalogError::UnknownSubject(subject_id));
            }
            let count = catalog.known_topic_count(subject_id);
            if count >= MAX_TOPICS_PER_SUBJECT {
                return Err(CatalogError::TopicCapReached { subject_id, count });
            }
        }
        self.backend.generate_more_topics(subject_id).await?;
        info!(%subject_id, "requested more topics");
        Ok(())
    }

    /// Load topics for `subject_ids` and poll for any still being generated.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Poll` if some subjects never resolve; those that did
    /// are already in the catalog.
    pub async fn ensure_topics(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        cancel: &CancellationToken,
    ) -> Result<(), CatalogError> {
        let empty = self.load_topics(subject_ids).await?;
        if empty.is_empty() {
            return Ok(());
        }
        info!(pending = ?empty, "waiting for topic generation");
        self.poller().poll_until_ready(&empty, cancel).await?;
        Ok(())
    }
}
