use thiserror::Error;

/// Error taxonomy for a sync pass.
///
/// `Network`/`HttpStatus`/`Parse` failures are caught at the orchestrator
/// boundary and recorded on the failing subscription; they never abort the
/// rest of a batch. `Storage` failures during reconciliation are tolerated
/// per event, while batch-level storage failures (database unavailable) are
/// fatal for the whole batch and retryable.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    HttpStatus(String),

    #[error("Could not parse calendar: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(e: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {e}"))
    }
}

pub type AppResult<T> = Result<T, SyncError>;
