//! Application configuration
//!
//! Centralizes filesystem paths and HTTP client settings. Webcal feeds can
//! be slow and large, so the timeouts lean generous.

use std::path::PathBuf;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("icsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the sqlite database holding subscriptions and mirrored events.
    pub database_path: PathBuf,
    /// Connection timeout for feed fetches.
    pub connect_timeout: Duration,
    /// Total request timeout for feed fetches.
    pub timeout: Duration,
    /// User-Agent header sent with every feed request.
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(60),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config pointing at an explicit database file, keeping default HTTP
    /// settings.
    pub fn with_database_path(path: PathBuf) -> Self {
        Self {
            database_path: path,
            ..Self::default()
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("icsync")
        .join("icsync.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.database_path.ends_with("icsync/icsync.db"));
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert!(config.user_agent.starts_with("icsync/"));
    }

    #[test]
    fn test_with_database_path() {
        let config = AppConfig::with_database_path(PathBuf::from("/tmp/test.db"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
