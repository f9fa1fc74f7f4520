#![forbid(unsafe_code)]

pub mod client;
pub mod http;
pub mod memory;

pub use client::{ApiError, PracticeBackend};
pub use http::{HttpBackend, HttpBackendConfig, HttpConfigError};
pub use memory::{InMemoryBackend, TopicReadiness};
