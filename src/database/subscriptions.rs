// file: src/database/subscriptions.rs

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::Subscription;

fn from_row(row: &Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get("id")?,
        calendar_id: row.get("calendar_id")?,
        url: row.get("url")?,
        display_name: row.get("display_name")?,
        color: row.get("color")?,
        etag: row.get("etag")?,
        last_modified: row.get("last_modified")?,
        last_sync: row.get("last_sync")?,
        error_message: row.get("error_message")?,
        ignore_embedded_alerts: row.get("ignore_embedded_alerts")?,
        default_alarm_minutes: row.get("default_alarm_minutes")?,
        default_all_day_alarm_minutes: row.get("default_all_day_alarm_minutes")?,
        ignore_description: row.get("ignore_description")?,
    })
}

pub fn add(conn: &Connection, subscription: &Subscription) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO subscriptions (
            url, display_name, color,
            ignore_embedded_alerts, default_alarm_minutes,
            default_all_day_alarm_minutes, ignore_description
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            subscription.url,
            subscription.display_name,
            subscription.color,
            subscription.ignore_embedded_alerts,
            subscription.default_alarm_minutes,
            subscription.default_all_day_alarm_minutes,
            subscription.ignore_description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_all(conn: &Connection) -> AppResult<Vec<Subscription>> {
    let mut stmt = conn.prepare("SELECT * FROM subscriptions ORDER BY id")?;
    let subscriptions = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(subscriptions)
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Subscription>> {
    let subscription = conn
        .query_row("SELECT * FROM subscriptions WHERE id = ?1", [id], from_row)
        .optional()?;
    Ok(subscription)
}

pub fn remove(conn: &Connection, id: i64) -> AppResult<bool> {
    let affected = conn.execute("DELETE FROM subscriptions WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

pub fn update_url(conn: &Connection, id: i64, url: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE subscriptions SET url = ?2 WHERE id = ?1",
        params![id, url],
    )?;
    Ok(())
}

pub fn update_calendar_id(conn: &Connection, id: i64, calendar_id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE subscriptions SET calendar_id = ?2 WHERE id = ?1",
        params![id, calendar_id],
    )?;
    Ok(())
}

pub fn update_settings(conn: &Connection, subscription: &Subscription) -> AppResult<()> {
    conn.execute(
        "UPDATE subscriptions
         SET display_name = ?2, color = ?3, ignore_embedded_alerts = ?4,
             default_alarm_minutes = ?5, default_all_day_alarm_minutes = ?6,
             ignore_description = ?7
         WHERE id = ?1",
        params![
            subscription.id,
            subscription.display_name,
            subscription.color,
            subscription.ignore_embedded_alerts,
            subscription.default_alarm_minutes,
            subscription.default_all_day_alarm_minutes,
            subscription.ignore_description,
        ],
    )?;
    Ok(())
}

pub fn update_sync_success(
    conn: &Connection,
    id: i64,
    etag: Option<&str>,
    last_modified: i64,
    sync_time: i64,
) -> AppResult<()> {
    conn.execute(
        "UPDATE subscriptions
         SET etag = ?2, last_modified = ?3, last_sync = ?4, error_message = NULL
         WHERE id = ?1",
        params![id, etag, last_modified, sync_time],
    )?;
    Ok(())
}

pub fn update_sync_error(
    conn: &Connection,
    id: i64,
    message: &str,
    sync_time: i64,
) -> AppResult<()> {
    conn.execute(
        "UPDATE subscriptions
         SET etag = NULL, last_modified = 0, last_sync = ?3, error_message = ?2
         WHERE id = ?1",
        params![id, message, sync_time],
    )?;
    Ok(())
}
