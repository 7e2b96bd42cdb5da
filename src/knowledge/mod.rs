//! Knowledge module - document ingestion and budgeted context assembly
//!
//! Documents are ingested per agent: the full original is persisted, a
//! provider-written summary is stored alongside it, and the summary's
//! estimated token count is fixed at ingestion. Context assembly
//! concatenates summaries newest-first under a hard token budget.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, RoostError};
use crate::providers::{ChatMessage, ChatOptions, ProviderRegistry};
use crate::store::{KnowledgeItem, PlatformStore};
use crate::tokens;
use crate::utils::string::prefix_chars;

/// Maximum characters of a document fed to summarization.
const SUMMARIZE_INPUT_CAP: usize = 50_000;

/// Length of the raw-prefix fallback summary when the provider fails.
const FALLBACK_SUMMARY_CHARS: usize = 1_000;

/// Fixed summarization instruction.
const SUMMARIZE_INSTRUCTION: &str = "Summarize the following document for later reference. \
     Extract the key facts, names and numbers. Respond with short bullet \
     points, at most 300 words.";

/// Placeholder summary source when PDF extraction yields nothing usable.
const PDF_EXTRACTION_PLACEHOLDER: &str =
    "[PDF text extraction produced no usable text; the document may be scanned or image-only]";

/// Classify a filename into a coarse content type by extension.
fn classify_content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" => "markdown",
        "pdf" => "pdf",
        "json" => "json",
        "csv" => "csv",
        "html" | "htm" => "html",
        _ => "text",
    }
}

/// Ingestion and retrieval of per-agent knowledge.
pub struct KnowledgeManager {
    store: PlatformStore,
    providers: Arc<ProviderRegistry>,
}

impl KnowledgeManager {
    pub fn new(store: PlatformStore, providers: Arc<ProviderRegistry>) -> Self {
        Self { store, providers }
    }

    /// Ingest a text document for an agent.
    ///
    /// The full original is persisted. Summarization input is capped at
    /// 50K chars (with an explicit truncation note); a provider failure
    /// degrades to a raw prefix instead of failing the ingestion.
    pub async fn ingest_file(
        &self,
        agent_id: &str,
        filename: &str,
        content: &str,
        model: &str,
    ) -> Result<KnowledgeItem> {
        let content_type = classify_content_type(filename);
        let summary = self.summarize(content, model).await;
        let token_count = tokens::estimate_text(&summary);

        let item = KnowledgeItem::new(
            agent_id,
            filename,
            content_type,
            content,
            &summary,
            token_count,
        );
        self.store.save_knowledge_item(&item)?;
        info!(agent_id, filename, token_count, "knowledge item ingested");
        Ok(item)
    }

    /// Ingest a PDF: extract text with lopdf, then follow the text path.
    ///
    /// Extraction that yields no usable text substitutes an explicit
    /// placeholder rather than storing an empty document.
    pub async fn ingest_pdf(
        &self,
        agent_id: &str,
        filename: &str,
        bytes: &[u8],
        model: &str,
    ) -> Result<KnowledgeItem> {
        let text = pdf_text(bytes)?;
        if text == PDF_EXTRACTION_PLACEHOLDER {
            warn!(agent_id, filename, "pdf extraction yielded no text");
        }
        self.ingest_file(agent_id, filename, &text, model).await
    }

    /// Ingest `content` unless the stored item for this filename already
    /// holds the same text. A changed file replaces the previous item, so
    /// repeated passes over a directory never accumulate duplicates.
    /// Returns the new item, or `None` when the stored copy was current.
    pub async fn sync_file(
        &self,
        agent_id: &str,
        filename: &str,
        content: &str,
        model: &str,
    ) -> Result<Option<KnowledgeItem>> {
        let existing = self.store.find_knowledge_by_filename(agent_id, filename)?;
        if let Some(existing) = &existing {
            if existing.original_content == content {
                return Ok(None);
            }
        }

        let item = self.ingest_file(agent_id, filename, content, model).await?;
        if let Some(existing) = existing {
            self.store.delete_knowledge_item(agent_id, &existing.id)?;
        }
        Ok(Some(item))
    }

    async fn summarize(&self, content: &str, model: &str) -> String {
        let provider = match self.providers.resolve(model) {
            Some(p) => p,
            None => {
                debug!(model, "no provider for summarization, using raw prefix");
                return prefix_chars(content, FALLBACK_SUMMARY_CHARS);
            }
        };

        let truncated = content.chars().count() > SUMMARIZE_INPUT_CAP;
        let input = prefix_chars(content, SUMMARIZE_INPUT_CAP);
        let mut prompt = format!("{}\n\n---\n{}", SUMMARIZE_INSTRUCTION, input);
        if truncated {
            prompt.push_str("\n\n[Note: the document was truncated for summarization]");
        }

        let messages = vec![ChatMessage::user(&prompt)];
        let options = ChatOptions::new().with_temperature(0.2).with_max_tokens(1024);

        match provider.chat(messages, vec![], Some(model), options).await {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            Ok(_) => prefix_chars(content, FALLBACK_SUMMARY_CHARS),
            Err(e) => {
                warn!(error = %e, "summarization failed, using raw prefix");
                prefix_chars(content, FALLBACK_SUMMARY_CHARS)
            }
        }
    }

    /// Assemble the agent's knowledge context block under `max_tokens`.
    ///
    /// Items are taken newest-first; an item that would push the running
    /// total past the budget is skipped and assembly stops. The result
    /// never exceeds the budget.
    pub fn knowledge_block(&self, agent_id: &str, max_tokens: u32) -> Result<String> {
        let items = self.store.list_knowledge_items(agent_id)?;
        let mut block = String::new();
        let mut used: u32 = 0;

        for item in items {
            let entry = format!("### {}\n{}", item.filename, item.summary);
            let cost = tokens::estimate_text(&entry);
            if used.saturating_add(cost) > max_tokens {
                break;
            }
            if !block.is_empty() {
                block.push_str("\n\n");
            }
            block.push_str(&entry);
            used += cost;
        }

        Ok(block)
    }

    /// Deep-copy knowledge items to another agent. With `item_ids` set,
    /// only those items are copied; otherwise all of them. Returns the
    /// number of copies made.
    pub fn share(
        &self,
        source_agent: &str,
        target_agent: &str,
        item_ids: Option<&[String]>,
    ) -> Result<usize> {
        let items = self.store.list_knowledge_items(source_agent)?;
        let mut copied = 0;

        for item in items {
            if let Some(ids) = item_ids {
                if !ids.contains(&item.id) {
                    continue;
                }
            }
            self.store.save_knowledge_item(&item.copy_for(target_agent))?;
            copied += 1;
        }

        info!(source_agent, target_agent, copied, "knowledge shared");
        Ok(copied)
    }

    /// Delete one item. Errors with `NotFound` when no row matched.
    pub fn delete_item(&self, agent_id: &str, item_id: &str) -> Result<()> {
        if self.store.delete_knowledge_item(agent_id, item_id)? {
            Ok(())
        } else {
            Err(RoostError::NotFound(format!(
                "knowledge item {} for agent {}",
                item_id, agent_id
            )))
        }
    }

    pub fn list_items(&self, agent_id: &str) -> Result<Vec<KnowledgeItem>> {
        self.store.list_knowledge_items(agent_id)
    }
}

/// Extracted PDF text, or the placeholder when nothing usable came out.
fn pdf_text(bytes: &[u8]) -> Result<String> {
    let text = extract_pdf_text(bytes)?;
    if text.trim().is_empty() {
        Ok(PDF_EXTRACTION_PLACEHOLDER.to_string())
    } else {
        Ok(text)
    }
}

/// Extract plain text from PDF bytes using lopdf.
fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| RoostError::Knowledge(format!("failed to load PDF: {}", e)))?;
    let mut text = String::new();
    for page_num in doc.get_pages().keys() {
        if let Ok(page_text) = doc.extract_text(&[*page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    Ok(text)
}

/// Handle to a running folder-sync daemon.
///
/// Stopping flips a flag checked at each tick; an in-flight ingestion
/// finishes normally.
pub struct FolderSyncHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl FolderSyncHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FolderSyncHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Start a polling watcher that ingests new and modified files from a
/// directory into an agent's knowledge.
pub fn spawn_folder_sync(
    manager: Arc<KnowledgeManager>,
    agent_id: String,
    dir: PathBuf,
    model: String,
    poll_interval: Duration,
) -> FolderSyncHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let task = tokio::spawn(async move {
        let mut seen: HashMap<PathBuf, std::time::SystemTime> = HashMap::new();
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if stop_flag.load(Ordering::SeqCst) {
                debug!(agent_id, "folder sync stopped");
                break;
            }

            let pattern = dir.join("*");
            let paths = match glob::glob(&pattern.to_string_lossy()) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(error = %e, "folder sync glob failed");
                    continue;
                }
            };

            for entry in paths.flatten() {
                if !entry.is_file() {
                    continue;
                }
                let modified = match entry.metadata().and_then(|m| m.modified()) {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if seen.get(&entry) == Some(&modified) {
                    continue;
                }

                let filename = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();

                let content = if classify_content_type(&filename) == "pdf" {
                    match tokio::fs::read(&entry).await {
                        Ok(bytes) => pdf_text(&bytes),
                        Err(e) => Err(e.into()),
                    }
                } else {
                    tokio::fs::read_to_string(&entry).await.map_err(Into::into)
                };

                let result = match content {
                    Ok(content) => {
                        manager
                            .sync_file(&agent_id, &filename, &content, &model)
                            .await
                    }
                    Err(e) => Err(e),
                };

                match result {
                    Ok(outcome) => {
                        if outcome.is_none() {
                            debug!(agent_id, filename, "folder sync: file unchanged");
                        }
                        seen.insert(entry, modified);
                    }
                    Err(e) => {
                        warn!(agent_id, filename, error = %e, "folder sync ingestion failed");
                    }
                }
            }
        }
    });

    FolderSyncHandle { stop, task }
}
