use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// Outcome of one subscription's sync pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub subscription_id: i64,
    pub success: bool,
    /// `None` when the feed was unchanged (HTTP 304) or the pass failed.
    pub stats: Option<ReconcileStats>,
    pub error_message: Option<String>,
    pub sync_time: DateTime<Utc>,
}

impl SyncResult {
    pub fn not_modified(subscription_id: i64) -> Self {
        Self {
            subscription_id,
            success: true,
            stats: None,
            error_message: None,
            sync_time: Utc::now(),
        }
    }

    pub fn with_stats(subscription_id: i64, stats: ReconcileStats) -> Self {
        Self {
            subscription_id,
            success: true,
            stats: Some(stats),
            error_message: None,
            sync_time: Utc::now(),
        }
    }

    pub fn with_error(subscription_id: i64, error: String) -> Self {
        Self {
            subscription_id,
            success: false,
            stats: None,
            error_message: Some(error),
            sync_time: Utc::now(),
        }
    }
}

/// Outcome of one batch over all subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<SyncResult>,
    /// True when the batch stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl BatchResult {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_result_not_modified() {
        let result = SyncResult::not_modified(1);
        assert!(result.success);
        assert!(result.stats.is_none());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_sync_result_with_stats() {
        let stats = ReconcileStats {
            inserted: 2,
            updated: 1,
            skipped: 3,
            deleted: 1,
        };
        let result = SyncResult::with_stats(1, stats);
        assert!(result.success);
        assert_eq!(result.stats.unwrap().inserted, 2);
    }

    #[test]
    fn test_sync_result_with_error() {
        let result = SyncResult::with_error(7, "HTTP error: 404 Not Found".to_string());
        assert!(!result.success);
        assert_eq!(result.subscription_id, 7);
        assert!(result.error_message.unwrap().contains("404"));
    }

    #[test]
    fn test_batch_result_counts_failures() {
        let batch = BatchResult {
            results: vec![
                SyncResult::not_modified(1),
                SyncResult::with_error(2, "boom".to_string()),
            ],
            cancelled: false,
        };
        assert_eq!(batch.failed_count(), 1);
        assert!(!batch.is_success());
    }

    #[test]
    fn test_cancelled_batch_is_not_success() {
        let batch = BatchResult {
            results: vec![SyncResult::not_modified(1)],
            cancelled: true,
        };
        assert!(!batch.is_success());
    }
}
