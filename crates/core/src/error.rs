use thiserror::Error;

use crate::model::{LedgerError, SettingsError, TestConfigError, TestSessionError};

/// Umbrella error for callers that only need "something in the domain was invalid".
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] TestConfigError),
    #[error(transparent)]
    Session(#[from] TestSessionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
