// file: src/database/events.rs

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::RemoteEvent;
use crate::reconcile::{LocalEvent, LocalEventStore};

/// An event row as stored, flattened: override instances are their own rows
/// with `recurrence_id` set.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: i64,
    pub uid: String,
    pub recurrence_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub dtstart: Option<i64>,
    pub dtend: Option<i64>,
    pub all_day: bool,
    pub rrule: Option<String>,
    pub reminders: Vec<i64>,
    pub last_modified: Option<i64>,
}

fn from_row(row: &Row) -> rusqlite::Result<StoredEvent> {
    let reminders_json: String = row.get("reminders")?;
    Ok(StoredEvent {
        id: row.get("id")?,
        uid: row.get("uid")?,
        recurrence_id: row.get("recurrence_id")?,
        summary: row.get("summary")?,
        description: row.get("description")?,
        location: row.get("location")?,
        dtstart: row.get("dtstart")?,
        dtend: row.get("dtend")?,
        all_day: row.get("all_day")?,
        rrule: row.get("rrule")?,
        reminders: serde_json::from_str(&reminders_json).unwrap_or_default(),
        last_modified: row.get("last_modified")?,
    })
}

pub fn get_all(conn: &Connection, calendar_id: i64) -> AppResult<Vec<StoredEvent>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM events WHERE calendar_id = ?1 ORDER BY uid, recurrence_id IS NOT NULL, id",
    )?;
    let events = stmt
        .query_map([calendar_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

/// Event rows of one calendar, as seen by the reconciler.
pub struct EventStore<'a> {
    conn: &'a Connection,
    calendar_id: i64,
}

impl<'a> EventStore<'a> {
    pub fn new(conn: &'a Connection, calendar_id: i64) -> Self {
        Self { conn, calendar_id }
    }

    fn insert_row(&self, event: &RemoteEvent) -> AppResult<()> {
        let reminders = serde_json::to_string(&event.reminders)
            .map_err(|e| crate::error::SyncError::parse(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO events (
                calendar_id, uid, recurrence_id, summary, description, location,
                dtstart, dtend, all_day, rrule, reminders, last_modified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                self.calendar_id,
                event.uid,
                event.recurrence_id,
                event.summary,
                event.description,
                event.location,
                event.start.map(|t| t.timestamp_millis()),
                event.end.map(|t| t.timestamp_millis()),
                event.all_day,
                event.rrule,
                reminders,
                event.last_modified,
            ],
        )?;
        Ok(())
    }

    fn delete_uid(&self, uid: &str) -> AppResult<usize> {
        let affected = self.conn.execute(
            "DELETE FROM events WHERE calendar_id = ?1 AND uid = ?2",
            params![self.calendar_id, uid],
        )?;
        Ok(affected)
    }
}

impl LocalEventStore for EventStore<'_> {
    fn find_by_uid(&self, uid: &str) -> AppResult<Option<LocalEvent>> {
        let found = self
            .conn
            .query_row(
                "SELECT uid, last_modified FROM events
                 WHERE calendar_id = ?1 AND uid = ?2 AND recurrence_id IS NULL",
                params![self.calendar_id, uid],
                |row| {
                    Ok(LocalEvent {
                        uid: row.get(0)?,
                        last_modified: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    fn insert_event(&mut self, event: &RemoteEvent) -> AppResult<()> {
        self.insert_row(event)?;
        for exception in &event.exceptions {
            self.insert_row(exception)?;
        }
        Ok(())
    }

    fn update_event(&mut self, event: &RemoteEvent) -> AppResult<()> {
        // replace the whole series, exceptions included
        self.delete_uid(&event.uid)?;
        self.insert_event(event)
    }

    fn delete_events_not_in(&mut self, keep_uids: &HashSet<String>) -> AppResult<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT uid FROM events
             WHERE calendar_id = ?1 AND recurrence_id IS NULL",
        )?;
        let stored_uids = stmt
            .query_map([self.calendar_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut deleted = 0;
        for uid in stored_uids {
            if !keep_uids.contains(&uid) {
                log::debug!("{uid} deleted locally, removing from local calendar");
                self.delete_uid(&uid)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::Subscription;
    use chrono::{TimeZone, Utc};

    fn calendar(db: &Database) -> i64 {
        let mut subscription = Subscription::new("https://example.com/feed.ics", "Test");
        subscription.id = db.add_subscription(&subscription).unwrap();
        db.ensure_calendar(&subscription).unwrap()
    }

    fn sample_event(uid: &str) -> RemoteEvent {
        let mut event = RemoteEvent::new(uid);
        event.summary = Some("Sample".to_string());
        event.start = Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
        event.end = Some(Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap());
        event.reminders = vec![15];
        event.last_modified = Some(1000);
        event
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let calendar_id = calendar(&db);
        let mut store = db.event_store(calendar_id);

        store.insert_event(&sample_event("a")).unwrap();

        let found = store.find_by_uid("a").unwrap().unwrap();
        assert_eq!(found.uid, "a");
        assert_eq!(found.last_modified, Some(1000));
        assert!(store.find_by_uid("b").unwrap().is_none());
    }

    #[test]
    fn test_series_stored_as_rows() {
        let db = Database::open_in_memory().unwrap();
        let calendar_id = calendar(&db);
        let mut store = db.event_store(calendar_id);

        let mut master = sample_event("series");
        let mut exception = sample_event("series");
        exception.recurrence_id = Some("20240108T100000Z".to_string());
        exception.summary = Some("Moved".to_string());
        master.exceptions.push(exception);

        store.insert_event(&master).unwrap();

        let rows = db.events_for_calendar(calendar_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].recurrence_id.is_none());
        assert_eq!(rows[1].recurrence_id.as_deref(), Some("20240108T100000Z"));
        assert_eq!(rows[0].reminders, vec![15]);
    }

    #[test]
    fn test_update_replaces_series() {
        let db = Database::open_in_memory().unwrap();
        let calendar_id = calendar(&db);
        let mut store = db.event_store(calendar_id);

        let mut master = sample_event("series");
        let mut exception = sample_event("series");
        exception.recurrence_id = Some("20240108T100000Z".to_string());
        master.exceptions.push(exception);
        store.insert_event(&master).unwrap();

        // the new version has no exceptions anymore
        let mut replacement = sample_event("series");
        replacement.summary = Some("Renamed".to_string());
        replacement.last_modified = Some(2000);
        store.update_event(&replacement).unwrap();

        let rows = db.events_for_calendar(calendar_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].summary.as_deref(), Some("Renamed"));
        assert_eq!(rows[0].last_modified, Some(2000));
    }

    #[test]
    fn test_orphan_deletion_spares_exception_rows_of_kept_series() {
        let db = Database::open_in_memory().unwrap();
        let calendar_id = calendar(&db);
        let mut store = db.event_store(calendar_id);

        let mut kept = sample_event("kept");
        let mut exception = sample_event("kept");
        exception.recurrence_id = Some("20240108T100000Z".to_string());
        kept.exceptions.push(exception);
        store.insert_event(&kept).unwrap();
        store.insert_event(&sample_event("gone")).unwrap();

        let keep: HashSet<String> = ["kept".to_string()].into();
        let deleted = store.delete_events_not_in(&keep).unwrap();

        assert_eq!(deleted, 1);
        let rows = db.events_for_calendar(calendar_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.uid == "kept"));
    }

    #[test]
    fn test_events_scoped_per_calendar() {
        let db = Database::open_in_memory().unwrap();
        let first = calendar(&db);
        let second = calendar(&db);

        db.event_store(first).insert_event(&sample_event("a")).unwrap();

        assert!(db.event_store(second).find_by_uid("a").unwrap().is_none());
        assert_eq!(db.events_for_calendar(second).unwrap().len(), 0);
    }
}
