//! SQLite-backed retention queue (spec §4.15): `runs(id INTEGER PK, config
//! TEXT, done BOOL, done_at INTEGER)`. The Windows worker's inability to
//! hold a long-lived broker connection while its network interface is
//! toggled is described in spec §4.15's prose only, with no wire-format
//! counterpart to follow.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension};
use stoneridge_types::{Result, StoneRidgeError};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// One queued run configuration, as handed to the Windows worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRun {
    pub id: i64,
    pub config: String,
}

pub struct RetentionQueue {
    conn: Connection,
}

impl RetentionQueue {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to open {}: {e}", path.display())))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                config TEXT NOT NULL,
                done BOOLEAN NOT NULL DEFAULT 0,
                done_at INTEGER
            )",
            (),
        )
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to create runs table: {e}")))?;
        Ok(RetentionQueue { conn })
    }

    /// Opens an in-memory queue, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to open in-memory db: {e}")))?;
        conn.execute(
            "CREATE TABLE runs (
                id INTEGER PRIMARY KEY,
                config TEXT NOT NULL,
                done BOOLEAN NOT NULL DEFAULT 0,
                done_at INTEGER
            )",
            (),
        )
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to create runs table: {e}")))?;
        Ok(RetentionQueue { conn })
    }

    /// Inserts one bridged message, `done = false`.
    pub fn insert(&self, config: &str) -> Result<i64> {
        self.conn
            .execute("INSERT INTO runs (config, done) VALUES (?1, 0)", (config,))
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to insert run: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Returns the oldest `done = false` row, marking it `done = true`
    /// within the same transaction (spec §4.15: "marking it `done=true`
    /// within the same transaction"). Returns `None` when the table has no
    /// pending work.
    pub fn pop_next(&self) -> Result<Option<QueuedRun>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to start transaction: {e}")))?;

        let found: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, config FROM runs WHERE done = 0 ORDER BY id ASC LIMIT 1",
                (),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to query next run: {e}")))?;

        let Some((id, config)) = found else {
            return Ok(None);
        };

        tx.execute("UPDATE runs SET done = 1, done_at = ?2 WHERE id = ?1", (id, now_unix()))
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to mark run done: {e}")))?;
        tx.commit()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to commit pop transaction: {e}")))?;

        Ok(Some(QueuedRun { id, config }))
    }

    /// Deletes `done = true` rows marked done more than `max_age` ago, for
    /// the `--purge-done-older-than-secs` manual purge flag. Retention is
    /// otherwise indefinite (spec §4.15: "no periodic purge is specified").
    pub fn purge_done_older_than(&self, max_age: Duration) -> Result<usize> {
        let threshold = now_unix() - max_age.as_secs() as i64;
        self.conn
            .execute("DELETE FROM runs WHERE done = 1 AND done_at <= ?1", (threshold,))
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to purge done rows: {e}")))
    }
}
