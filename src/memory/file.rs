//! JSON-file memory backend.
//!
//! One log file per agent, rewritten on every append and trimmed to the
//! configured retention count. This keeps the file bounded the way a
//! capped remote log would be, at single-process scale.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::error::Result;

use super::{MemoryStore, MessageRecord};

/// Durable JSON log with trim-on-write retention.
pub struct FileMemory {
    path: PathBuf,
    messages: Mutex<Vec<MessageRecord>>,
    max_messages: usize,
}

impl FileMemory {
    /// Open (or create) the log at `path`, loading existing entries.
    pub fn new(path: PathBuf, max_messages: usize) -> Result<Self> {
        let messages = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            messages: Mutex::new(messages),
            max_messages,
        })
    }

    fn persist(&self, messages: &[MessageRecord]) -> Result<()> {
        let content = serde_json::to_string_pretty(messages)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for FileMemory {
    async fn add_message(&self, record: MessageRecord) -> Result<()> {
        let mut messages = self.messages.lock().await;
        messages.push(record);
        // Trim to the most recent max_messages on every write
        let excess = messages.len().saturating_sub(self.max_messages);
        if excess > 0 {
            messages.drain(..excess);
        }
        self.persist(&messages)
    }

    async fn get_messages(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let messages = self.messages.lock().await;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }

    async fn clear(&self) -> Result<()> {
        let mut messages = self.messages.lock().await;
        messages.clear();
        self.persist(&messages)
    }

    async fn close(&self) -> Result<()> {
        let messages = self.messages.lock().await;
        self.persist(&messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatRole;
    use tempfile::tempdir;

    fn rec(content: &str) -> MessageRecord {
        MessageRecord::new("a1", "cli", ChatRole::User, content)
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a1.json");

        {
            let store = FileMemory::new(path.clone(), 100).unwrap();
            store.add_message(rec("hello")).await.unwrap();
            store.add_message(rec("world")).await.unwrap();
            store.close().await.unwrap();
        }

        let store = FileMemory::new(path, 100).unwrap();
        let msgs = store.get_messages(10).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "hello");
    }

    #[tokio::test]
    async fn test_trim_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a1.json");

        let store = FileMemory::new(path.clone(), 3).unwrap();
        for i in 0..6 {
            store.add_message(rec(&format!("m{}", i))).await.unwrap();
        }
        let msgs = store.get_messages(10).await.unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content, "m3");

        // Trim is durable, not just in-memory
        let reopened = FileMemory::new(path, 3).unwrap();
        assert_eq!(reopened.get_messages(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_clear_empties_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a1.json");

        let store = FileMemory::new(path.clone(), 100).unwrap();
        store.add_message(rec("one")).await.unwrap();
        store.clear().await.unwrap();

        let reopened = FileMemory::new(path, 100).unwrap();
        assert!(reopened.get_messages(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_messages_limit() {
        let dir = tempdir().unwrap();
        let store = FileMemory::new(dir.path().join("a1.json"), 100).unwrap();
        for i in 0..5 {
            store.add_message(rec(&format!("m{}", i))).await.unwrap();
        }
        let msgs = store.get_messages(2).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "m3");
        assert_eq!(msgs[1].content, "m4");
    }
}
