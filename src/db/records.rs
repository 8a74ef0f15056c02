//! Row-level operations on the `records` table.

use crate::errors::{AppResult, DatabaseError};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// A stored record row.
#[derive(Debug, Clone)]
pub struct StoredRow {
    /// Row id assigned by SQLite
    pub id: i64,
    /// Record type name the row belongs to
    pub record_type: String,
    /// Key of the record within its type
    pub record_key: String,
    /// Serialized JSON body, with encrypted fields as marked ciphertext
    pub body: String,
    /// Timestamp of the last write
    pub updated_at: String,
}

/// Inserts a record body or replaces the stored one.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_record(conn: &Connection, record_type: &str, key: &str, body: &str) -> AppResult<()> {
    debug!("Upserting {} record {}", record_type, key);

    conn.execute(
        r#"
        INSERT INTO records (record_type, record_key, body, updated_at)
        VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
        ON CONFLICT(record_type, record_key) DO UPDATE SET
            body = excluded.body,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![record_type, key, body],
    )
    .map_err(DatabaseError::Sqlite)?;

    Ok(())
}

/// Retrieves a record row by type and key.
///
/// Returns `Ok(None)` if no such record is stored.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_record(conn: &Connection, record_type: &str, key: &str) -> AppResult<Option<StoredRow>> {
    debug!("Getting {} record {}", record_type, key);

    conn.query_row(
        r#"
        SELECT id, record_type, record_key, body, updated_at
        FROM records
        WHERE record_type = ?1 AND record_key = ?2
        "#,
        params![record_type, key],
        |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                record_type: row.get(1)?,
                record_key: row.get(2)?,
                body: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(|e| DatabaseError::Sqlite(e).into())
}

/// Keys of all stored records of a type, in insertion order.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_keys(conn: &Connection, record_type: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT record_key FROM records WHERE record_type = ?1 ORDER BY id ASC")
        .map_err(DatabaseError::Sqlite)?;

    let keys = stmt
        .query_map(params![record_type], |row| row.get(0))
        .map_err(DatabaseError::Sqlite)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(DatabaseError::Sqlite)?;

    debug!("Found {} stored {} records", keys.len(), record_type);
    Ok(keys)
}

/// Number of stored records of a type.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn count_records(conn: &Connection, record_type: &str) -> AppResult<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM records WHERE record_type = ?1",
            params![record_type],
            |row| row.get(0),
        )
        .map_err(DatabaseError::Sqlite)?;

    Ok(count as usize)
}
