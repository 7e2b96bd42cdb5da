//! Transient in-process memory backend.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::error::Result;

use super::{MemoryStore, MessageRecord};

/// Bounded in-memory ring buffer. Nothing survives a restart.
pub struct BufferMemory {
    messages: Mutex<VecDeque<MessageRecord>>,
    max_messages: usize,
}

impl BufferMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            max_messages,
        }
    }
}

#[async_trait]
impl MemoryStore for BufferMemory {
    async fn add_message(&self, record: MessageRecord) -> Result<()> {
        let mut messages = self.messages.lock().await;
        messages.push_back(record);
        while messages.len() > self.max_messages {
            messages.pop_front();
        }
        Ok(())
    }

    async fn get_messages(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let messages = self.messages.lock().await;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.iter().skip(skip).cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.messages.lock().await.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
