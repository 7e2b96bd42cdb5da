//! Configuration type definitions.
//!
//! Every field carries a serde default so a partial config file (or none at
//! all) deserializes into a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the Roost platform.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Provider credentials keyed by provider name ("openai", "openrouter", ...).
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Declarative custom skills (HTTP request templates).
    #[serde(default)]
    pub custom_skills: Vec<CustomSkillDef>,
}

/// Agent-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

/// Defaults applied when an agent is created without explicit values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// How many recent memory messages feed each turn's context.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Memory backend kind: "sqlite", "file" or "buffer".
    #[serde(default = "default_memory_backend")]
    pub memory_backend: String,

    /// Token budget for the knowledge block injected into context.
    #[serde(default = "default_knowledge_budget")]
    pub knowledge_token_budget: u32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            history_limit: default_history_limit(),
            memory_backend: default_memory_backend(),
            knowledge_token_budget: default_knowledge_budget(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    8096
}

fn default_history_limit() -> usize {
    100
}

fn default_memory_backend() -> String {
    "sqlite".to_string()
}

fn default_knowledge_budget() -> u32 {
    4000
}

/// Credentials and routing for one LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_base: Option<String>,

    /// Model identifier prefixes this provider serves, e.g. ["gpt-", "o1-"].
    #[serde(default)]
    pub model_prefixes: Vec<String>,
}

/// Filesystem layout for durable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Platform database file. Relative paths resolve under `Config::dir()`.
    #[serde(default = "default_database_file")]
    pub database: String,

    /// Directory for per-agent memory files (sqlite or JSON logs).
    #[serde(default = "default_memory_dir")]
    pub memory_dir: String,

    /// Legacy directory of per-agent JSON config files loaded at startup.
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_file(),
            memory_dir: default_memory_dir(),
            agents_dir: default_agents_dir(),
        }
    }
}

fn default_database_file() -> String {
    "roost.db".to_string()
}

fn default_memory_dir() -> String {
    "memory".to_string()
}

fn default_agents_dir() -> String {
    "agents".to_string()
}

/// Scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick interval in seconds for the due-task scan.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Hard timeout for a single task execution.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            execution_timeout_secs: default_execution_timeout(),
        }
    }
}

fn default_tick_interval() -> u64 {
    1
}

fn default_execution_timeout() -> u64 {
    60
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Optional log file path (JSON format only); stderr otherwise.
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            file: None,
            level: default_log_level(),
        }
    }
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Declarative custom skill: an HTTP request template exposed to agents.
///
/// `{{key}}` placeholders in the url and body are substituted from the
/// call arguments before the request is sent. No code is loaded or
/// executed for custom skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSkillDef {
    pub id: String,

    pub description: String,

    #[serde(default = "default_skill_version")]
    pub version: String,

    #[serde(default = "default_http_method")]
    pub method: String,

    pub url: String,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Parameter names substitutable into the template.
    #[serde(default)]
    pub parameters: Vec<CustomSkillParam>,
}

/// One declared parameter of a custom skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSkillParam {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,
}

fn default_skill_version() -> String {
    "1.0.0".to_string()
}

fn default_http_method() -> String {
    "GET".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_defaults() {
        let d = AgentDefaults::default();
        assert_eq!(d.model, "gpt-4o-mini");
        assert_eq!(d.temperature, 0.7);
        assert_eq!(d.history_limit, 100);
        assert_eq!(d.memory_backend, "sqlite");
        assert_eq!(d.knowledge_token_budget, 4000);
    }

    #[test]
    fn test_scheduler_defaults() {
        let s = SchedulerConfig::default();
        assert_eq!(s.tick_interval_secs, 1);
        assert_eq!(s.execution_timeout_secs, 60);
    }

    #[test]
    fn test_custom_skill_def_defaults() {
        let json = r#"{"id": "weather", "description": "Fetch weather", "url": "https://example.com/{{city}}"}"#;
        let def: CustomSkillDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.method, "GET");
        assert_eq!(def.version, "1.0.0");
        assert!(def.body.is_none());
        assert!(def.parameters.is_empty());
    }

    #[test]
    fn test_provider_config_map() {
        let json = r#"{
            "providers": {
                "openai": {
                    "api_key": "sk-xxx",
                    "model_prefixes": ["gpt-", "o1-"]
                }
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let openai = config.providers.get("openai").unwrap();
        assert_eq!(openai.api_key.as_deref(), Some("sk-xxx"));
        assert_eq!(openai.model_prefixes, vec!["gpt-", "o1-"]);
    }
}
