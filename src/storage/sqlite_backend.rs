//! SQLite snapshot store
//!
//! rusqlite is blocking, so every call runs on the blocking pool and is
//! bounded by the configured store timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::backend::{SnapshotStore, StoreResult};
use super::migrations::run_migrations;
use crate::error::StoreError;
use crate::types::{Snapshot, SyncLogEntry};

/// Snapshot store backed by a single SQLite connection
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl SqliteSnapshotStore {
    /// Open or create a database file
    pub fn open(db_path: &str, timeout: Duration) -> StoreResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Task(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open_with_flags(db_path, flags)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    /// In-memory database, for tests
    pub fn open_in_memory(timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let task = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(StoreError::Task(join.to_string())),
            Err(_) => {
                tracing::error!("Snapshot store {} timed out after {:?}", operation, self.timeout);
                Err(StoreError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Task(format!("bad timestamp {:?}: {}", raw, e)))
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Snapshot>> {
        let key = key.to_string();
        self.run_blocking("get", move |conn| {
            let row = conn
                .query_row(
                    "SELECT payload, captured_at FROM snapshots WHERE key = ?",
                    params![key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            match row {
                Some((payload, captured_at)) => Ok(Some(Snapshot::new(
                    key,
                    serde_json::from_str(&payload)?,
                    parse_ts(&captured_at)?,
                ))),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(
        &self,
        key: &str,
        payload: serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> StoreResult<Snapshot> {
        let snapshot = Snapshot::new(key, payload, captured_at);
        let row = snapshot.clone();
        self.run_blocking("put", move |conn| {
            conn.execute(
                "INSERT INTO snapshots (key, payload, captured_at, source_mode)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    payload = excluded.payload,
                    captured_at = excluded.captured_at,
                    source_mode = excluded.source_mode",
                params![
                    row.key,
                    serde_json::to_string(&row.payload)?,
                    format_ts(&row.captured_at),
                    row.source_mode.as_str(),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(snapshot)
    }

    async fn snapshot_count(&self) -> StoreResult<usize> {
        self.run_blocking("count", |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn record_sync(&self, entry: &SyncLogEntry) -> StoreResult<()> {
        let entry = entry.clone();
        self.run_blocking("record_sync", move |conn| {
            conn.execute(
                "INSERT INTO sync_log (service, success, records_written, error_message, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.service_name,
                    entry.success as i32,
                    entry.records_written as i64,
                    entry.error,
                    format_ts(&entry.synced_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn last_successful_sync(&self, service_name: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let service_name = service_name.to_string();
        self.run_blocking("last_successful_sync", move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT synced_at FROM sync_log
                     WHERE service = ? AND success = 1
                     ORDER BY synced_at DESC LIMIT 1",
                    params![service_name],
                    |row| row.get(0),
                )
                .optional()?;
            raw.as_deref().map(parse_ts).transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn store() -> SqliteSnapshotStore {
        SqliteSnapshotStore::open_in_memory(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_put_overwrites_by_key() {
        let store = store();
        let t0 = Utc::now();

        store.put("lighting.lights", json!({"1": {"on": true}}), t0).await.unwrap();
        store
            .put("lighting.lights", json!({"1": {"on": false}}), t0 + ChronoDuration::seconds(5))
            .await
            .unwrap();

        assert_eq!(store.snapshot_count().await.unwrap(), 1);
        let latest = store.get("lighting.lights").await.unwrap().unwrap();
        assert_eq!(latest.payload, json!({"1": {"on": false}}));
        assert_eq!(
            latest.captured_at.timestamp_micros(),
            (t0 + ChronoDuration::seconds(5)).timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        assert!(store().get("transit.predictions").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_successful_sync_ignores_failures() {
        let store = store();
        let t0 = Utc::now();
        let entry = |success: bool, at: DateTime<Utc>| SyncLogEntry {
            service_name: "lighting".into(),
            success,
            records_written: if success { 4 } else { 0 },
            error: (!success).then(|| "unreachable".to_string()),
            synced_at: at,
        };

        store.record_sync(&entry(true, t0)).await.unwrap();
        store
            .record_sync(&entry(false, t0 + ChronoDuration::minutes(5)))
            .await
            .unwrap();

        let last = store.last_successful_sync("lighting").await.unwrap();
        assert_eq!(last.map(|t| t.timestamp_micros()), Some(t0.timestamp_micros()));
        assert!(store.last_successful_sync("transit").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshots.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteSnapshotStore::open(path, Duration::from_secs(5)).unwrap();
            store.put("fitness.summary", json!({"workouts": 3}), Utc::now()).await.unwrap();
        }

        let reopened = SqliteSnapshotStore::open(path, Duration::from_secs(5)).unwrap();
        let snapshot = reopened.get("fitness.summary").await.unwrap().unwrap();
        assert_eq!(snapshot.payload["workouts"], 3);
    }
}
