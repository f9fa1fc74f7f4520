mod access;
mod catalog;
mod ids;
mod ledger;
mod result;
mod session;
mod settings;
mod test_config;

pub use ids::{ParseIdError, QuestionId, SubjectId, TestSessionId, TopicId};

pub use access::{AccessStatus, UserRole};
pub use catalog::{MAX_TOPICS_PER_SUBJECT, Pagination, Subject, Topic, TopicPage};
pub use ledger::{AnswerLedger, LedgerError, LedgerSummary};
pub use result::{AnswerEntry, QuestionDetail, SubmissionPayload, SubmitResponse, TestResult};
pub use session::{Question, TestSession, TestSessionError};
pub use settings::{EngineSettings, EngineSettingsDraft, ExpiryPolicy, SettingsError};
pub use test_config::{
    DURATION_MINUTES_RANGE, Difficulty, MAX_SUBJECTS_PER_TEST, QUESTION_COUNT_RANGE,
    SubjectTopics, TestConfig, TestConfigError, TopicScope, ValidationError,
};
