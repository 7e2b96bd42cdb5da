//! Agent configuration types.
//!
//! `AgentConfig` is the persisted shape, `AgentDraft` is the caller-facing
//! creation input (defaults filled by the manager), and `AgentUpdate`
//! carries merge-style partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AgentDefaults;
use crate::memory::{MemoryBackendConfig, MemoryBackendKind};

/// Persisted lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Stopped,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Running => "running",
            AgentStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => AgentStatus::Running,
            _ => AgentStatus::Stopped,
        }
    }
}

/// Full configuration of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_limit: usize,
    #[serde(default)]
    pub memory: MemoryBackendConfig,
    pub knowledge_token_budget: u32,
    /// Skill ids to bind at construction
    #[serde(default)]
    pub skills: Vec<String>,
    pub owner_id: String,
    #[serde(default)]
    pub parent_agent_id: Option<String>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation input. Unset fields take platform defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub memory_backend: Option<MemoryBackendKind>,
    #[serde(default)]
    pub knowledge_token_budget: Option<u32>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl AgentDraft {
    /// Materialize a full config, filling gaps from platform defaults.
    pub fn into_config(
        self,
        defaults: &AgentDefaults,
        owner_id: &str,
        parent_agent_id: Option<String>,
    ) -> AgentConfig {
        let now = Utc::now();
        AgentConfig {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| "You are a helpful assistant.".to_string()),
            model: self.model.unwrap_or_else(|| defaults.model.clone()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
            memory: MemoryBackendConfig {
                kind: self
                    .memory_backend
                    .unwrap_or_else(|| MemoryBackendKind::parse(&defaults.memory_backend)),
                ..MemoryBackendConfig::default()
            },
            knowledge_token_budget: self
                .knowledge_token_budget
                .unwrap_or(defaults.knowledge_token_budget),
            skills: self.skills,
            owner_id: owner_id.to_string(),
            parent_agent_id,
            status: AgentStatus::Running,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update with merge semantics: `None` fields keep their current
/// values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub knowledge_token_budget: Option<u32>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
}

impl AgentConfig {
    /// Apply a partial update and bump `updated_at`.
    pub fn merge(&mut self, update: AgentUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(system_prompt) = update.system_prompt {
            self.system_prompt = system_prompt;
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(history_limit) = update.history_limit {
            self.history_limit = history_limit;
        }
        if let Some(budget) = update.knowledge_token_budget {
            self.knowledge_token_budget = budget;
        }
        if let Some(skills) = update.skills {
            self.skills = skills;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AgentDefaults {
        AgentDefaults::default()
    }

    #[test]
    fn test_draft_fills_defaults() {
        let draft = AgentDraft {
            name: "helper".to_string(),
            ..Default::default()
        };
        let config = draft.into_config(&defaults(), "user-1", None);

        assert_eq!(config.name, "helper");
        assert_eq!(config.model, defaults().model);
        assert_eq!(config.temperature, defaults().temperature);
        assert_eq!(config.owner_id, "user-1");
        assert_eq!(config.status, AgentStatus::Running);
        assert!(config.parent_agent_id.is_none());
        assert!(!config.id.is_empty());
    }

    #[test]
    fn test_draft_explicit_values_win() {
        let draft = AgentDraft {
            name: "custom".to_string(),
            model: Some("gpt-4o".to_string()),
            temperature: Some(0.1),
            skills: vec!["echo".to_string()],
            ..Default::default()
        };
        let config = draft.into_config(&defaults(), "user-1", Some("parent-1".to_string()));

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.skills, vec!["echo"]);
        assert_eq!(config.parent_agent_id.as_deref(), Some("parent-1"));
    }

    #[test]
    fn test_merge_partial_update() {
        let draft = AgentDraft {
            name: "before".to_string(),
            ..Default::default()
        };
        let mut config = draft.into_config(&defaults(), "user-1", None);
        let original_model = config.model.clone();
        let original_updated = config.updated_at;

        config.merge(AgentUpdate {
            name: Some("after".to_string()),
            temperature: Some(0.2),
            ..Default::default()
        });

        assert_eq!(config.name, "after");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.model, original_model);
        assert!(config.updated_at >= original_updated);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AgentStatus::parse("running"), AgentStatus::Running);
        assert_eq!(AgentStatus::parse("stopped"), AgentStatus::Stopped);
        assert_eq!(AgentStatus::parse("unknown"), AgentStatus::Stopped);
    }
}
