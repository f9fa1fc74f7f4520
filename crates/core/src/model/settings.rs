use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens when the clock runs out for a user who may not submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Block the forced submission and raise an access-denied signal until the
    /// user resolves access. The attempt stays in memory.
    #[default]
    RequireAccess,
    /// Submit on expiry regardless of access.
    SubmitRegardless,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("poll attempts must be > 0")]
    InvalidPollAttempts,

    #[error("poll interval must be > 0 ms")]
    InvalidPollInterval,

    #[error("topic page size must be > 0")]
    InvalidPageSize,

    #[error("low time ratio must be in (0, 1), got {0}")]
    InvalidLowTimeRatio(f64),

    #[error("tick interval must be > 0 ms")]
    InvalidTickInterval,

    #[error("unknown expiry policy: {0}")]
    UnknownExpiryPolicy(String),
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSettings {
    poll_max_attempts: u32,
    poll_interval_ms: u64,
    topic_page_size: u32,
    low_time_ratio: f64,
    tick_interval_ms: u64,
    expiry_policy: ExpiryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_max_attempts: 20,
            poll_interval_ms: 2_000,
            topic_page_size: 10,
            low_time_ratio: 0.10,
            tick_interval_ms: 1_000,
            expiry_policy: ExpiryPolicy::RequireAccess,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn poll_max_attempts(&self) -> u32 {
        self.poll_max_attempts
    }

    #[must_use]
    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    #[must_use]
    pub fn topic_page_size(&self) -> u32 {
        self.topic_page_size
    }

    /// Fraction of the total duration below which the clock is considered low.
    #[must_use]
    pub fn low_time_ratio(&self) -> f64 {
        self.low_time_ratio
    }

    #[must_use]
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    #[must_use]
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry_policy
    }
}

/// Partially specified settings, e.g. loaded from the environment or a file.
///
/// Missing fields fall back to `EngineSettings::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSettingsDraft {
    pub poll_max_attempts: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub topic_page_size: Option<u32>,
    pub low_time_ratio: Option<f64>,
    pub tick_interval_ms: Option<u64>,
    pub expiry_policy: Option<ExpiryPolicy>,
}

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft into usable settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` for zero counts/intervals or a ratio outside `(0, 1)`.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        let defaults = EngineSettings::default();
        let settings = EngineSettings {
            poll_max_attempts: self.poll_max_attempts.unwrap_or(defaults.poll_max_attempts),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            topic_page_size: self.topic_page_size.unwrap_or(defaults.topic_page_size),
            low_time_ratio: self.low_time_ratio.unwrap_or(defaults.low_time_ratio),
            tick_interval_ms: self.tick_interval_ms.unwrap_or(defaults.tick_interval_ms),
            expiry_policy: self.expiry_policy.unwrap_or(defaults.expiry_policy),
        };

        if settings.poll_max_attempts == 0 {
            return Err(SettingsError::InvalidPollAttempts);
        }
        if settings.poll_interval_ms == 0 {
            return Err(SettingsError::InvalidPollInterval);
        }
        if settings.topic_page_size == 0 {
            return Err(SettingsError::InvalidPageSize);
        }
        let ratio = settings.low_time_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
            return Err(SettingsError::InvalidLowTimeRatio(ratio));
        }
        if settings.tick_interval_ms == 0 {
            return Err(SettingsError::InvalidTickInterval);
        }

        Ok(settings)
    }
}

impl std::str::FromStr for ExpiryPolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "require_access" | "require-access" => Ok(Self::RequireAccess),
            "submit_regardless" | "submit-regardless" => Ok(Self::SubmitRegardless),
            other => Err(SettingsError::UnknownExpiryPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_yields_defaults() {
        let settings = EngineSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.poll_max_attempts(), 20);
        assert_eq!(settings.poll_interval_ms(), 2_000);
    }

    #[test]
    fn rejects_zero_attempts() {
        let draft = EngineSettingsDraft {
            poll_max_attempts: Some(0),
            ..EngineSettingsDraft::default()
        };
        assert_eq!(draft.validate(), Err(SettingsError::InvalidPollAttempts));
    }

    #[test]
    fn rejects_ratio_outside_unit_interval() {
        for ratio in [0.0, 1.0, f64::NAN] {
            let draft = EngineSettingsDraft {
                low_time_ratio: Some(ratio),
                ..EngineSettingsDraft::default()
            };
            assert!(matches!(
                draft.validate(),
                Err(SettingsError::InvalidLowTimeRatio(_))
            ));
        }
    }

    #[test]
    fn deserializes_partial_json() {
        let draft: EngineSettingsDraft =
            serde_json::from_str(r#"{"poll_max_attempts": 3, "expiry_policy": "submit_regardless"}"#)
                .unwrap();
        let settings = draft.validate().unwrap();
        assert_eq!(settings.poll_max_attempts(), 3);
        assert_eq!(settings.expiry_policy(), ExpiryPolicy::SubmitRegardless);
        assert_eq!(settings.topic_page_size(), 10);
    }

    #[test]
    fn parses_expiry_policy_names() {
        assert_eq!(
            "submit-regardless".parse::<ExpiryPolicy>(),
            Ok(ExpiryPolicy::SubmitRegardless)
        );
        assert_eq!(
            " REQUIRE_ACCESS ".parse::<ExpiryPolicy>(),
            Ok(ExpiryPolicy::RequireAccess)
        );
        assert!("later".parse::<ExpiryPolicy>().is_err());
    }
}
