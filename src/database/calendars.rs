// file: src/database/calendars.rs

use rusqlite::{params, Connection};

use crate::error::AppResult;
use crate::models::{CalendarMetadata, Subscription};

pub fn create(conn: &Connection, name: &str, color: Option<i32>) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO calendars (name, color) VALUES (?1, ?2)",
        params![name, color],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, name: &str, color: Option<i32>) -> AppResult<()> {
    conn.execute(
        "UPDATE calendars SET name = ?2, color = COALESCE(?3, color) WHERE id = ?1",
        params![id, name, color],
    )?;
    Ok(())
}

/// Feed-provided properties fill the gaps the user left open: the name only
/// backs an unnamed subscription, the color applies when the subscription
/// has none of its own.
pub fn apply_metadata(
    conn: &Connection,
    id: i64,
    subscription: &Subscription,
    metadata: &CalendarMetadata,
) -> AppResult<()> {
    if subscription.display_name.is_empty() {
        if let Some(name) = &metadata.name {
            conn.execute(
                "UPDATE calendars SET name = ?2 WHERE id = ?1",
                params![id, name],
            )?;
        }
    }
    if subscription.color.is_none() {
        if let Some(color) = metadata.color {
            conn.execute(
                "UPDATE calendars SET color = ?2 WHERE id = ?1",
                params![id, color],
            )?;
        }
    }
    Ok(())
}

/// Drops calendars whose subscription is gone; their events cascade.
pub fn delete_orphans(conn: &Connection) -> AppResult<usize> {
    let affected = conn.execute(
        "DELETE FROM calendars WHERE id NOT IN (
            SELECT calendar_id FROM subscriptions WHERE calendar_id IS NOT NULL
         )",
        [],
    )?;
    Ok(affected)
}

pub fn get_name_and_color(conn: &Connection, id: i64) -> AppResult<(String, Option<i32>)> {
    let row = conn.query_row(
        "SELECT name, color FROM calendars WHERE id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(row)
}
