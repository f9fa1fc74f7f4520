//! Shared error types for the services crate.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use backend::ApiError;
use practice_core::model::{LedgerError, SubjectId, TestConfigError, TopicPage};

use crate::sessions::EngineState;

fn list_ids(ids: &BTreeSet<SubjectId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors emitted by `TopicCatalogService`.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("no subjects are available")]
    NoSubjects,
    #[error("unknown subject {0}")]
    UnknownSubject(SubjectId),
    #[error("subject {subject_id} already has {count} topics")]
    TopicCapReached { subject_id: SubjectId, count: u32 },
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `TopicGenerationPoller`.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PollError {
    /// The attempt budget ran out. Subjects in `resolved` were merged into the
    /// catalog and stay usable.
    #[error("topics still generating for subjects {}", list_ids(.unresolved))]
    Timeout {
        resolved: BTreeMap<SubjectId, TopicPage>,
        unresolved: BTreeSet<SubjectId>,
    },
    #[error("topic polling cancelled")]
    Cancelled,
}

/// Errors emitted by session engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: EngineState, to: EngineState },
    #[error("operation not allowed while {0}")]
    NotAllowed(EngineState),
    #[error("no active test session")]
    NoSession,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors emitted while starting a test.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TestStartError {
    #[error(transparent)]
    Validation(#[from] TestConfigError),
    #[error("test configuration rejected: {0}")]
    Rejected(String),
    #[error("no questions available for the selection")]
    NoQuestionsAvailable,
    #[error("no previous test to retake")]
    NothingToRetake,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for TestStartError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(message) => TestStartError::Rejected(message),
            ApiError::NoQuestionsAvailable => TestStartError::NoQuestionsAvailable,
            other => TestStartError::Api(other),
        }
    }
}

/// Errors emitted while submitting an attempt. Answers are never dropped.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by PDF export.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DownloadError {
    #[error("PDF export requires an active payment")]
    RequiresPayment,
    #[error("test has not been scored yet")]
    NotComplete,
    #[error("PDF download failed: {0}")]
    Failed(ApiError),
}

impl From<ApiError> for DownloadError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::PaymentRequired => DownloadError::RequiresPayment,
            other => DownloadError::Failed(other),
        }
    }
}
