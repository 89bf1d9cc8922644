// file: src/database/mod.rs

use std::path::Path;

use rusqlite::Connection;

use crate::error::AppResult;
use crate::models::{CalendarMetadata, Credential, Subscription};

pub mod calendars;
pub mod credentials;
pub mod events;
pub mod subscriptions;

pub use events::{EventStore, StoredEvent};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private scratch database, used by tests and dry runs.
    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        log::info!("Database initialized");
        Ok(Database { conn })
    }

    // --- Subscription delegates ---

    pub fn add_subscription(&self, subscription: &Subscription) -> AppResult<i64> {
        subscriptions::add(&self.conn, subscription)
    }

    pub fn get_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        subscriptions::get_all(&self.conn)
    }

    pub fn get_subscription(&self, id: i64) -> AppResult<Option<Subscription>> {
        subscriptions::get(&self.conn, id)
    }

    pub fn remove_subscription(&self, id: i64) -> AppResult<bool> {
        subscriptions::remove(&self.conn, id)
    }

    pub fn update_subscription_url(&self, id: i64, url: &str) -> AppResult<()> {
        subscriptions::update_url(&self.conn, id, url)
    }

    pub fn update_subscription_settings(&self, subscription: &Subscription) -> AppResult<()> {
        subscriptions::update_settings(&self.conn, subscription)
    }

    /// Records a successful sync: fresh conditional-request tokens, the sync
    /// time, and no error.
    pub fn update_sync_success(
        &self,
        id: i64,
        etag: Option<&str>,
        last_modified: i64,
        sync_time: i64,
    ) -> AppResult<()> {
        subscriptions::update_sync_success(&self.conn, id, etag, last_modified, sync_time)
    }

    /// Records a failed sync. The conditional-request tokens are cleared so
    /// the next attempt fetches the full resource again.
    pub fn update_sync_error(&self, id: i64, message: &str, sync_time: i64) -> AppResult<()> {
        subscriptions::update_sync_error(&self.conn, id, message, sync_time)
    }

    // --- Credential delegates ---

    pub fn set_credential(&self, credential: &Credential) -> AppResult<()> {
        credentials::set(&self.conn, credential)
    }

    pub fn get_credential(&self, subscription_id: i64) -> AppResult<Option<Credential>> {
        credentials::get(&self.conn, subscription_id)
    }

    pub fn delete_credential(&self, subscription_id: i64) -> AppResult<()> {
        credentials::delete(&self.conn, subscription_id)
    }

    // --- Calendar delegates ---

    /// Returns the subscription's local calendar, creating it on first use.
    pub fn ensure_calendar(&self, subscription: &Subscription) -> AppResult<i64> {
        match subscription.calendar_id {
            Some(id) => {
                calendars::update(&self.conn, id, &subscription.display_name, subscription.color)?;
                Ok(id)
            }
            None => {
                let id =
                    calendars::create(&self.conn, &subscription.display_name, subscription.color)?;
                subscriptions::update_calendar_id(&self.conn, subscription.id, id)?;
                Ok(id)
            }
        }
    }

    pub fn calendar_name_and_color(&self, id: i64) -> AppResult<(String, Option<i32>)> {
        calendars::get_name_and_color(&self.conn, id)
    }

    /// Removes calendars left behind by deleted subscriptions, events
    /// included.
    pub fn delete_orphan_calendars(&self) -> AppResult<usize> {
        calendars::delete_orphans(&self.conn)
    }

    /// Applies feed-provided calendar properties where the subscription
    /// doesn't override them.
    pub fn apply_calendar_metadata(
        &self,
        calendar_id: i64,
        subscription: &Subscription,
        metadata: &CalendarMetadata,
    ) -> AppResult<()> {
        calendars::apply_metadata(&self.conn, calendar_id, subscription, metadata)
    }

    // --- Event delegates ---

    /// An event store scoped to one calendar, for reconciliation.
    pub fn event_store(&self, calendar_id: i64) -> EventStore<'_> {
        EventStore::new(&self.conn, calendar_id)
    }

    pub fn events_for_calendar(&self, calendar_id: i64) -> AppResult<Vec<StoredEvent>> {
        events::get_all(&self.conn, calendar_id)
    }
}
