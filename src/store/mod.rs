//! Platform store - single SQLite database for durable platform state
//!
//! Holds agents, permission rows, knowledge items, scheduled tasks and
//! task execution logs. The connection sits behind a mutex; impl blocks
//! are split per concern across `agents.rs`, `knowledge.rs` and
//! `tasks.rs`.

mod agents;
mod knowledge;
mod tasks;

pub use knowledge::KnowledgeItem;
pub use tasks::{ExecutionStatus, ScheduledTask, TaskExecutionLog, TaskType};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, RoostError};

/// Shared handle to the platform database.
#[derive(Clone)]
pub struct PlatformStore {
    conn: Arc<Mutex<Connection>>,
}

impl PlatformStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS agents (
                id               TEXT PRIMARY KEY,
                owner_id         TEXT NOT NULL,
                parent_agent_id  TEXT,
                status           TEXT NOT NULL,
                config           TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS agent_permissions (
                agent_id   TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                role       TEXT NOT NULL,
                granted_at TEXT NOT NULL,
                PRIMARY KEY (agent_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS knowledge_items (
                id               TEXT PRIMARY KEY,
                agent_id         TEXT NOT NULL,
                filename         TEXT NOT NULL,
                content_type     TEXT NOT NULL,
                original_content TEXT NOT NULL,
                summary          TEXT NOT NULL,
                token_count      INTEGER NOT NULL,
                created_at       TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_knowledge_agent
                ON knowledge_items(agent_id, created_at);

            CREATE TABLE IF NOT EXISTS scheduled_tasks (
                id           TEXT PRIMARY KEY,
                agent_id     TEXT NOT NULL,
                name         TEXT NOT NULL,
                description  TEXT NOT NULL,
                task_type    TEXT NOT NULL,
                cron_expr    TEXT NOT NULL,
                timezone     TEXT NOT NULL,
                config       TEXT NOT NULL,
                enabled      INTEGER NOT NULL,
                last_run_at  TEXT,
                next_run_at  TEXT,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_execution_logs (
                id           TEXT PRIMARY KEY,
                task_id      TEXT NOT NULL,
                agent_id     TEXT NOT NULL,
                started_at   TEXT NOT NULL,
                completed_at TEXT,
                status       TEXT NOT NULL,
                result       TEXT,
                error        TEXT,
                duration_ms  INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_logs_task
                ON task_execution_logs(task_id, started_at);",
        )?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RoostError::Store("store connection lock poisoned".to_string()))
    }
}
