use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use practice_core::model::{
    AccessStatus, Subject, SubjectId, SubmissionPayload, SubmitResponse, TestConfig, TestSession,
    TestSessionId, TopicPage,
};
use thiserror::Error;

/// Errors surfaced by backend adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request rejected: {0}")]
    Validation(String),

    #[error("no questions available for the selection")]
    NoQuestionsAvailable,

    #[error("rate limited")]
    RateLimited,

    #[error("session expired on the server")]
    SessionExpired,

    #[error("payment required")]
    PaymentRequired,

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("service unavailable")]
    Unavailable,
}

impl ApiError {
    /// Returns true for failures that are worth retrying without user action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::RateLimited | ApiError::Unavailable
        )
    }
}

/// Remote calls consumed by the practice engine.
///
/// Transport and wire format are the implementation's concern.
#[async_trait]
pub trait PracticeBackend: Send + Sync {
    /// List every subject available for practice.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures.
    async fn list_subjects(&self) -> Result<Vec<Subject>, ApiError>;

    /// Fetch one page of topics for each requested subject.
    ///
    /// Subjects whose topics are still being generated come back with an empty
    /// page; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures.
    async fn get_topics(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        page: u32,
        page_size: u32,
    ) -> Result<BTreeMap<SubjectId, TopicPage>, ApiError>;

    /// Ask the server to generate more topics for a subject. Returns once enqueued.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RateLimited` or `ApiError::Unavailable` when generation is refused.
    async fn generate_more_topics(&self, subject_id: SubjectId) -> Result<(), ApiError>;

    /// Create a test session for a validated config.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the server rejects the config and
    /// `ApiError::NoQuestionsAvailable` if nothing matches the selection.
    async fn start_test(&self, config: &TestConfig) -> Result<TestSession, ApiError>;

    /// Current payment/role status of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures.
    async fn get_access_status(&self) -> Result<AccessStatus, ApiError>;

    /// Submit an attempt for scoring.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if the server no longer knows the session.
    async fn submit_test(&self, payload: &SubmissionPayload) -> Result<SubmitResponse, ApiError>;

    /// Download the scored test as a PDF.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::PaymentRequired` when the export is a paid feature for this user.
    async fn download_test_pdf(&self, test_id: TestSessionId) -> Result<Vec<u8>, ApiError>;
}
