//! Durable queue of backend mirror writes

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::Result;
use crate::models::MirrorOp;
use rusqlite::{params, Connection, OptionalExtension};

/// A queued mirror write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: i64,
    pub record_key: String,
    pub op: MirrorOp,
    /// Failed delivery attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
}

/// Outbox operations over a borrowed connection
pub struct SqliteOutbox<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutbox<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Queue `op`, dropping any older pending write for the same record.
    ///
    /// Returns the new entry id.
    pub fn enqueue(&self, op: &MirrorOp, now_ms: i64) -> Result<i64> {
        let record_key = op.record_key();
        let payload = serde_json::to_string(op)?;

        let superseded = self.conn.execute(
            "DELETE FROM sync_outbox WHERE record_key = ?1",
            params![record_key],
        )?;
        if superseded > 0 {
            tracing::debug!("Superseded {superseded} pending mirror write(s) for {record_key}");
        }

        self.conn.execute(
            "INSERT INTO sync_outbox (record_key, payload, attempts, created_at) VALUES (?1, ?2, 0, ?3)",
            params![record_key, payload, now_ms],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Drop pending writes for one record without queueing a new one
    pub fn discard(&self, record_key: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM sync_outbox WHERE record_key = ?1",
            params![record_key],
        )?)
    }

    /// Oldest pending entries first
    ///
    /// Rows whose payload no longer decodes are dropped.
    pub fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, record_key, payload, attempts, last_error, created_at
             FROM sync_outbox
             ORDER BY id ASC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, record_key, payload, attempts, last_error, created_at) in rows {
            match serde_json::from_str::<MirrorOp>(&payload) {
                Ok(op) => entries.push(OutboxEntry {
                    id,
                    record_key,
                    op,
                    attempts,
                    last_error,
                    created_at,
                }),
                Err(error) => {
                    tracing::error!("Dropping undecodable outbox entry {id} ({record_key}): {error}");
                    self.complete(id)?;
                }
            }
        }

        Ok(entries)
    }

    /// Whether the entry is still queued (it may have been superseded or delivered)
    pub fn exists(&self, id: i64) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sync_outbox WHERE id = ?1",
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Remove a delivered (or abandoned) entry
    pub fn complete(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_outbox WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Record a failed delivery attempt and return the new attempt count
    ///
    /// Returns `None` when the entry is gone.
    pub fn record_failure(&self, id: i64, error: &str) -> Result<Option<u32>> {
        let attempts = self
            .conn
            .query_row(
                "UPDATE sync_outbox SET attempts = attempts + 1, last_error = ?2
                 WHERE id = ?1
                 RETURNING attempts",
                params![id, error],
                |row| row.get(0),
            )
            .optional()?;
        Ok(attempts)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_outbox", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Discard every queued write
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM sync_outbox", [])?)
    }
}
