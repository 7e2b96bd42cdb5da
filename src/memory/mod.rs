//! Memory module - per-agent append-only conversation logs
//!
//! Each agent owns one memory store holding its durable conversation
//! history. Three backends are available behind the [`MemoryStore`] trait:
//!
//! - `sqlite`: durable per-agent database file, survives restarts
//! - `file`: JSON log file trimmed to the most recent entries on write
//! - `buffer`: transient in-process ring buffer
//!
//! Messages are immutable once written; `clear` is the only deletion path.

mod buffer;
mod file;
mod sqlite;

pub use buffer::BufferMemory;
pub use file::FileMemory;
pub use sqlite::SqliteMemory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, RoostError};
use crate::providers::{ChatRole, ToolCallRecord};

/// One persisted conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message id
    pub id: String,
    /// Owning agent
    pub agent_id: String,
    /// Logical channel the message arrived on ("cli", "scheduler", ...)
    pub channel: String,
    pub role: ChatRole,
    pub content: String,
    /// Tool calls recorded on assistant messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Free-form metadata (delegation depth, task ids, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// Create a new record with a fresh id and the current timestamp.
    pub fn new(agent_id: &str, channel: &str, role: ChatRole, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            channel: channel.to_string(),
            role,
            content: content.to_string(),
            tool_calls: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Memory backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackendKind {
    Sqlite,
    File,
    Buffer,
}

impl MemoryBackendKind {
    /// Parse a backend name; unknown values fall back to `Buffer`.
    pub fn parse(s: &str) -> Self {
        match s {
            "sqlite" => MemoryBackendKind::Sqlite,
            "file" => MemoryBackendKind::File,
            _ => MemoryBackendKind::Buffer,
        }
    }
}

/// Configuration for one agent's memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBackendConfig {
    pub kind: MemoryBackendKind,
    /// Maximum messages retained (file and buffer backends trim to this).
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_max_messages() -> usize {
    500
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            kind: MemoryBackendKind::Buffer,
            max_messages: default_max_messages(),
        }
    }
}

/// Append-only conversation log for one agent.
///
/// `get_messages(limit)` returns the `limit` most recent messages in
/// oldest-first order, regardless of backend.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append a message. Records are immutable once written.
    async fn add_message(&self, record: MessageRecord) -> Result<()>;

    /// The `limit` most recent messages, oldest first.
    async fn get_messages(&self, limit: usize) -> Result<Vec<MessageRecord>>;

    /// Delete all messages for this agent.
    async fn clear(&self) -> Result<()>;

    /// Flush and release backend resources. Further calls may fail.
    async fn close(&self) -> Result<()>;
}

/// Open the configured backend for an agent, creating storage under
/// `base_dir` for durable kinds.
pub fn open(
    agent_id: &str,
    config: &MemoryBackendConfig,
    base_dir: &Path,
) -> Result<Arc<dyn MemoryStore>> {
    match config.kind {
        MemoryBackendKind::Buffer => Ok(Arc::new(BufferMemory::new(config.max_messages))),
        MemoryBackendKind::File => {
            std::fs::create_dir_all(base_dir)?;
            let path = base_dir.join(format!("{}.json", sanitize_id(agent_id)));
            Ok(Arc::new(FileMemory::new(path, config.max_messages)?))
        }
        MemoryBackendKind::Sqlite => {
            std::fs::create_dir_all(base_dir)?;
            let path = base_dir.join(format!("{}.db", sanitize_id(agent_id)));
            let store = SqliteMemory::open(&path)
                .map_err(|e| RoostError::Memory(format!("open {}: {}", path.display(), e)))?;
            Ok(Arc::new(store))
        }
    }
}

/// Sanitize an agent id into a safe filename component.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!(MemoryBackendKind::parse("sqlite"), MemoryBackendKind::Sqlite);
        assert_eq!(MemoryBackendKind::parse("file"), MemoryBackendKind::File);
        assert_eq!(MemoryBackendKind::parse("buffer"), MemoryBackendKind::Buffer);
        assert_eq!(MemoryBackendKind::parse("redis"), MemoryBackendKind::Buffer);
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("agent-123"), "agent-123");
        assert_eq!(sanitize_id("../etc/passwd"), "___etc_passwd");
    }

    #[test]
    fn test_message_record_new() {
        let rec = MessageRecord::new("a1", "cli", ChatRole::User, "hello");
        assert_eq!(rec.agent_id, "a1");
        assert_eq!(rec.channel, "cli");
        assert!(rec.tool_calls.is_none());
        assert!(rec.metadata.is_empty());
        assert!(!rec.id.is_empty());
    }

    #[test]
    fn test_message_record_metadata() {
        let rec = MessageRecord::new("a1", "cli", ChatRole::User, "hi")
            .with_metadata("delegation_depth", serde_json::json!(2));
        assert_eq!(rec.metadata["delegation_depth"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn test_open_buffer_backend() {
        let config = MemoryBackendConfig {
            kind: MemoryBackendKind::Buffer,
            max_messages: 10,
        };
        let store = open("a1", &config, Path::new("/nonexistent-unused")).unwrap();
        store
            .add_message(MessageRecord::new("a1", "cli", ChatRole::User, "hi"))
            .await
            .unwrap();
        let msgs = store.get_messages(10).await.unwrap();
        assert_eq!(msgs.len(), 1);
    }
}
