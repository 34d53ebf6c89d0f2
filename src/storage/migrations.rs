//! Database migrations for the snapshot store

use rusqlite::Connection;

use crate::error::StoreError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Snapshots keyed by logical resource (v1)
fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            captured_at TEXT NOT NULL,
            source_mode TEXT NOT NULL DEFAULT 'local'
        );

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

/// Sync log (v2)
fn migrate_v2(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sync_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service TEXT NOT NULL,
            success INTEGER NOT NULL,
            records_written INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            synced_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sync_log_service
            ON sync_log(service, success, synced_at DESC);

        INSERT INTO schema_version (version) VALUES (2);
        "#,
    )?;
    Ok(())
}
