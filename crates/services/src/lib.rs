#![forbid(unsafe_code)]

pub mod cancel;
pub mod catalog;
pub mod config_builder;
pub mod error;
pub mod events;
pub mod results;
pub mod sessions;

pub use practice_core::Clock;
pub use sessions as session;

pub use cancel::CancellationToken;
pub use catalog::{SharedCatalog, TopicCatalog, TopicCatalogService, TopicGenerationPoller};
pub use config_builder::{TestConfigBuilder, TestSelection};
pub use practice_core::model::SubjectTopics;
pub use error::{
    CatalogError, DownloadError, PollError, SessionError, SubmissionError, TestStartError,
};
pub use events::{AccessDeniedReason, EngineEvent, EventBus};
pub use results::{
    QuestionOutcome, ResultBreakdown, ResultCompiler, ResultReport, ReviewedQuestion,
    SubjectBreakdown,
};
pub use sessions::{
    ClockTask, CountdownTimer, EngineState, Navigation, SessionDriver, SubmitOutcome,
    SubmitStart, TestSessionEngine, TickOutcome, TimerEvent,
};
