use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use backend::PracticeBackend;
use practice_core::model::{EngineSettings, SubjectId, TopicPage};

use crate::cancel::CancellationToken;
use crate::catalog::SharedCatalog;
use crate::error::PollError;
use crate::events::{EngineEvent, EventBus};

/// Bounded retry loop that waits for server-side topic generation.
///
/// Each round fetches the first page for every pending subject. Non-empty pages
/// are merged into the shared catalog as soon as they arrive, so subjects that
/// resolve stay usable even if others time out.
#[derive(Clone)]
pub struct TopicGenerationPoller {
    backend: Arc<dyn PracticeBackend>,
    catalog: SharedCatalog,
    events: EventBus,
    max_attempts: u32,
    interval: Duration,
    page_size: u32,
}

impl TopicGenerationPoller {
    #[must_use]
    pub fn new(
        backend: Arc<dyn PracticeBackend>,
        catalog: SharedCatalog,
        events: EventBus,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            backend,
            catalog,
            events,
            max_attempts: settings.poll_max_attempts(),
            interval: Duration::from_millis(settings.poll_interval_ms()),
            page_size: settings.topic_page_size(),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Poll until every subject in `subject_ids` has topics.
    ///
    /// A failed round is logged and still counts against the attempt budget.
    ///
    /// # Errors
    ///
    /// Returns `PollError::Timeout` naming the subjects that never resolved, or
    /// `PollError::Cancelled` once `cancel` fires. A response that lands after
    /// cancellation is discarded.
    pub async fn poll_until_ready(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<SubjectId, TopicPage>, PollError> {
        let mut pending = subject_ids.clone();
        let mut resolved = BTreeMap::new();

        for attempt in 1..=self.max_attempts {
            if pending.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PollError::Cancelled),
                result = self.backend.get_topics(&pending, 1, self.page_size) => result,
            };

            match fetched {
                Ok(pages) => {
                    let mut catalog = self.catalog.write().await;
                    if cancel.is_cancelled() {
                        debug!(attempt, "discarding topic poll response after cancellation");
                        return Err(PollError::Cancelled);
                    }
                    for (subject_id, page) in pages {
                        if page.is_empty() || !pending.remove(&subject_id) {
                            continue;
                        }
                        catalog.merge_page(page.clone());
                        resolved.insert(subject_id, page);
                    }
                }
                Err(err) => {
                    warn!(attempt, error = %err, "topic poll round failed");
                }
            }

            debug!(
                attempt,
                max_attempts = self.max_attempts,
                resolved = resolved.len(),
                pending = pending.len(),
                "topic poll round finished"
            );
            self.events.emit(EngineEvent::PollProgress {
                attempt,
                max_attempts: self.max_attempts,
                resolved: resolved.keys().copied().collect(),
                pending: pending.clone(),
            });

            if pending.is_empty() || attempt == self.max_attempts {
                break;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PollError::Cancelled),
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        if pending.is_empty() {
            info!(subjects = resolved.len(), "topic generation complete");
            Ok(resolved)
        } else {
            warn!(unresolved = ?pending, "topic generation timed out");
            Err(PollError::Timeout {
                resolved,
                unresolved: pending,
            })
        }
    }
}
