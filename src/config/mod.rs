//! Configuration management for Roost
//!
//! Configuration is loaded from `~/.roost/config.json` with environment
//! variable overrides following the pattern `ROOST_SECTION_KEY`.

mod types;

pub use types::*;

use crate::error::Result;
use std::path::PathBuf;

impl Config {
    /// Returns the Roost data directory path (~/.roost)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".roost")
    }

    /// Returns the path to the config file (~/.roost/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROOST_AGENTS_DEFAULTS_MODEL") {
            self.agents.defaults.model = val;
        }
        if let Ok(val) = std::env::var("ROOST_AGENTS_DEFAULTS_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("ROOST_AGENTS_DEFAULTS_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("ROOST_AGENTS_DEFAULTS_HISTORY_LIMIT") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.history_limit = v;
            }
        }

        if let Ok(val) = std::env::var("ROOST_STORAGE_DATABASE") {
            self.storage.database = val;
        }

        if let Ok(val) = std::env::var("ROOST_SCHEDULER_EXECUTION_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.scheduler.execution_timeout_secs = v;
            }
        }

        // Provider API keys: ROOST_PROVIDERS_<NAME>_API_KEY
        for name in ["openai", "openrouter", "groq"] {
            let var = format!("ROOST_PROVIDERS_{}_API_KEY", name.to_uppercase());
            if let Ok(val) = std::env::var(&var) {
                let provider = self.providers.entry(name.to_string()).or_default();
                provider.api_key = Some(val);
            }
            let var = format!("ROOST_PROVIDERS_{}_API_BASE", name.to_uppercase());
            if let Ok(val) = std::env::var(&var) {
                let provider = self.providers.entry(name.to_string()).or_default();
                provider.api_base = Some(val);
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve a storage path: absolute paths pass through, relative paths
    /// land under the data directory.
    pub fn resolve_storage_path(&self, value: &str) -> PathBuf {
        let p = PathBuf::from(value);
        if p.is_absolute() {
            p
        } else {
            Self::dir().join(p)
        }
    }

    /// Path to the platform database file.
    pub fn database_path(&self) -> PathBuf {
        self.resolve_storage_path(&self.storage.database)
    }

    /// Path to the per-agent memory directory.
    pub fn memory_dir(&self) -> PathBuf {
        self.resolve_storage_path(&self.storage.memory_dir)
    }

    /// Path to the legacy agent config directory.
    pub fn agents_dir(&self) -> PathBuf {
        self.resolve_storage_path(&self.storage.agents_dir)
    }
}
