// icsync library
// Exposes the sync engine for the CLI and for integration tests

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod models;
pub mod parser;
pub mod reconcile;

// Re-export commonly used types
pub use config::AppConfig;
pub use database::Database;
pub use engine::{validate_feed, FeedInfo, SyncEngine};
pub use error::{AppResult, SyncError};
pub use models::*;
