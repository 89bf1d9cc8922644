// file: src/database/credentials.rs

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppResult;
use crate::models::Credential;

pub fn set(conn: &Connection, credential: &Credential) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO credentials (subscription_id, username, password)
         VALUES (?1, ?2, ?3)",
        params![
            credential.subscription_id,
            credential.username,
            credential.password,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, subscription_id: i64) -> AppResult<Option<Credential>> {
    let credential = conn
        .query_row(
            "SELECT subscription_id, username, password
             FROM credentials WHERE subscription_id = ?1",
            [subscription_id],
            |row| {
                Ok(Credential {
                    subscription_id: row.get(0)?,
                    username: row.get(1)?,
                    password: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(credential)
}

pub fn delete(conn: &Connection, subscription_id: i64) -> AppResult<()> {
    conn.execute(
        "DELETE FROM credentials WHERE subscription_id = ?1",
        [subscription_id],
    )?;
    Ok(())
}
