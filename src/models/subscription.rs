use serde::{Deserialize, Serialize};

/// A user-configured calendar feed together with its sync settings and the
/// status of the last sync attempt.
///
/// `last_modified` and `last_sync` are epoch milliseconds; `0` means unknown
/// resp. never synced. `calendar_id` stays `None` until the local calendar
/// has been materialized by the batch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub calendar_id: Option<i64>,
    /// Feed URL: http(s), file:// or a plain filesystem path.
    pub url: String,
    pub display_name: String,
    pub color: Option<i32>,

    // sync status
    pub etag: Option<String>,
    pub last_modified: i64,
    pub last_sync: i64,
    pub error_message: Option<String>,

    // settings
    pub ignore_embedded_alerts: bool,
    pub default_alarm_minutes: Option<i64>,
    pub default_all_day_alarm_minutes: Option<i64>,
    pub ignore_description: bool,
}

impl Subscription {
    pub fn new<U: Into<String>, N: Into<String>>(url: U, display_name: N) -> Self {
        Self {
            id: 0,
            calendar_id: None,
            url: url.into(),
            display_name: display_name.into(),
            color: None,
            etag: None,
            last_modified: 0,
            last_sync: 0,
            error_message: None,
            ignore_embedded_alerts: false,
            default_alarm_minutes: None,
            default_all_day_alarm_minutes: None,
            ignore_description: false,
        }
    }
}
