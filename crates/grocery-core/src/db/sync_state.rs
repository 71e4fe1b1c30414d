//! Persisted sync bookkeeping

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

const LAST_SYNC_TIME_KEY: &str = "last_sync_time_ms";
const LAST_SYNC_DURATION_KEY: &str = "last_sync_duration_ms";

/// When the last successful full sync finished and how long it took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStamp {
    /// Completion time (Unix ms)
    pub last_sync_time_ms: i64,
    pub last_sync_duration_ms: i64,
}

/// Trait for sync state storage operations
pub trait SyncStateRepository {
    /// Load the stamp of the last successful sync, if any
    fn load(&self) -> Result<Option<SyncStamp>>;

    /// Save the stamp of a successful sync
    fn save(&self, stamp: SyncStamp) -> Result<()>;

    /// Forget the stamp so the next sync runs unthrottled
    fn clear(&self) -> Result<()>;
}

/// `SQLite` implementation of `SyncStateRepository`
pub struct SqliteSyncStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_value(&self, key: &str) -> Result<Option<i64>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.and_then(|value| match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!("Ignoring unparseable sync state {key}={value}");
                None
            }
        }))
    }

    fn set_value(&self, key: &str, value: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value.to_string()],
        )?;
        Ok(())
    }
}

impl SyncStateRepository for SqliteSyncStateRepository<'_> {
    fn load(&self) -> Result<Option<SyncStamp>> {
        let Some(last_sync_time_ms) = self.get_value(LAST_SYNC_TIME_KEY)? else {
            return Ok(None);
        };
        let last_sync_duration_ms = self.get_value(LAST_SYNC_DURATION_KEY)?.unwrap_or(0);

        Ok(Some(SyncStamp {
            last_sync_time_ms,
            last_sync_duration_ms,
        }))
    }

    fn save(&self, stamp: SyncStamp) -> Result<()> {
        self.set_value(LAST_SYNC_TIME_KEY, stamp.last_sync_time_ms)?;
        self.set_value(LAST_SYNC_DURATION_KEY, stamp.last_sync_duration_ms)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sync_state WHERE key IN (?1, ?2)",
            params![LAST_SYNC_TIME_KEY, LAST_SYNC_DURATION_KEY],
        )?;
        Ok(())
    }
}
