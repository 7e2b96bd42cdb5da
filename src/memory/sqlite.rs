//! SQLite memory backend.
//!
//! One database file per agent. Ordering relies on rowid, which is
//! append order; no trimming happens on write, the query side limits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Result, RoostError};
use crate::providers::ChatRole;

use super::{MemoryStore, MessageRecord};

/// Durable per-agent message log in SQLite.
pub struct SqliteMemory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemory {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id          TEXT PRIMARY KEY,
                agent_id    TEXT NOT NULL,
                channel     TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                tool_calls  TEXT,
                metadata    TEXT,
                timestamp   TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (tests).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id          TEXT PRIMARY KEY,
                agent_id    TEXT NOT NULL,
                channel     TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                tool_calls  TEXT,
                metadata    TEXT,
                timestamp   TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RoostError::Memory("memory connection lock poisoned".to_string()))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let role: String = row.get(3)?;
    let tool_calls: Option<String> = row.get(5)?;
    let metadata: Option<String> = row.get(6)?;
    let timestamp: String = row.get(7)?;

    Ok(MessageRecord {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        channel: row.get(2)?,
        role: ChatRole::parse(&role),
        content: row.get(4)?,
        tool_calls: tool_calls.and_then(|s| serde_json::from_str(&s).ok()),
        metadata: metadata
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        timestamp: timestamp
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl MemoryStore for SqliteMemory {
    async fn add_message(&self, record: MessageRecord) -> Result<()> {
        let tool_calls = record
            .tool_calls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metadata = if record.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.metadata)?)
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (id, agent_id, channel, role, content, tool_calls, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.agent_id,
                record.channel,
                record.role.as_str(),
                record.content,
                tool_calls,
                metadata,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get_messages(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, channel, role, content, tool_calls, metadata, timestamp
             FROM messages ORDER BY rowid DESC LIMIT ?1",
        )?;
        let mut records: Vec<MessageRecord> = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<rusqlite::Result<_>>()?;
        // Query is newest-first for the LIMIT; callers get oldest-first
        records.reverse();
        Ok(records)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM messages", [])?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Connection closes on drop; nothing to flush beyond WAL defaults
        Ok(())
    }
}
