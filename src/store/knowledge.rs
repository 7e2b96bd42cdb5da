//! Knowledge item persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

use super::PlatformStore;

/// One ingested document: full original plus an immutable summary whose
/// token cost drives budget decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub agent_id: String,
    pub filename: String,
    /// Classified from the file extension ("text", "markdown", "pdf", ...)
    pub content_type: String,
    pub original_content: String,
    pub summary: String,
    /// Estimated tokens of the summary, fixed at ingestion
    pub token_count: u32,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeItem {
    pub fn new(
        agent_id: &str,
        filename: &str,
        content_type: &str,
        original_content: &str,
        summary: &str,
        token_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            original_content: original_content.to_string(),
            summary: summary.to_string(),
            token_count,
            created_at: Utc::now(),
        }
    }

    /// Independent copy of this item for another agent.
    pub fn copy_for(&self, agent_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<KnowledgeItem> {
    let created_at: String = row.get(7)?;
    Ok(KnowledgeItem {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        filename: row.get(2)?,
        content_type: row.get(3)?,
        original_content: row.get(4)?,
        summary: row.get(5)?,
        token_count: row.get::<_, i64>(6)? as u32,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

const ITEM_COLUMNS: &str =
    "id, agent_id, filename, content_type, original_content, summary, token_count, created_at";

impl PlatformStore {
    pub fn save_knowledge_item(&self, item: &KnowledgeItem) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO knowledge_items
                (id, agent_id, filename, content_type, original_content, summary, token_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.id,
                item.agent_id,
                item.filename,
                item.content_type,
                item.original_content,
                item.summary,
                item.token_count as i64,
                item.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_knowledge_item(&self, agent_id: &str, item_id: &str) -> Result<Option<KnowledgeItem>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM knowledge_items WHERE agent_id = ?1 AND id = ?2",
                    ITEM_COLUMNS
                ),
                params![agent_id, item_id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// All items for an agent, newest first.
    pub fn list_knowledge_items(&self, agent_id: &str) -> Result<Vec<KnowledgeItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM knowledge_items WHERE agent_id = ?1
             ORDER BY created_at DESC, rowid DESC",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![agent_id], row_to_item)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(items)
    }

    /// Delete one item. Returns whether a row existed.
    pub fn delete_knowledge_item(&self, agent_id: &str, item_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM knowledge_items WHERE agent_id = ?1 AND id = ?2",
            params![agent_id, item_id],
        )?;
        Ok(changed > 0)
    }

    /// Find an item by filename (used by folder sync to detect re-ingestion).
    pub fn find_knowledge_by_filename(
        &self,
        agent_id: &str,
        filename: &str,
    ) -> Result<Option<KnowledgeItem>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM knowledge_items
                     WHERE agent_id = ?1 AND filename = ?2
                     ORDER BY created_at DESC LIMIT 1",
                    ITEM_COLUMNS
                ),
                params![agent_id, filename],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }
}
