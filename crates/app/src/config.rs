use std::env;
use std::fmt;

use practice_core::model::{EngineSettings, EngineSettingsDraft, SettingsError};

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, raw: String },
    Settings(SettingsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, raw } => write!(f, "{var} must be a number, got {raw:?}"),
            ConfigError::Settings(err) => write!(f, "invalid engine settings: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<SettingsError> for ConfigError {
    fn from(err: SettingsError) -> Self {
        ConfigError::Settings(err)
    }
}

/// Process configuration, read once at startup after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineSettings,
    pub rust_log: String,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed numbers or settings that fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut draft = EngineSettingsDraft::new();
        draft.poll_max_attempts = parse_var("PRACTICE_POLL_ATTEMPTS")?;
        draft.poll_interval_ms = parse_var("PRACTICE_POLL_INTERVAL_MS")?;
        draft.topic_page_size = parse_var("PRACTICE_TOPIC_PAGE_SIZE")?;
        draft.tick_interval_ms = parse_var("PRACTICE_TICK_INTERVAL_MS")?;
        draft.expiry_policy = match env::var("PRACTICE_EXPIRY_POLICY") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.parse()?),
            _ => None,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            engine: draft.validate()?,
            rust_log,
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, raw }),
        _ => Ok(None),
    }
}
