//! Skill registry.
//!
//! Skills are registered explicitly at startup. Each carries an enabled
//! flag; disabled skills stay registered but are skipped at bind time.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::providers::ToolDefinition;

use super::Skill;

struct Entry {
    skill: Arc<dyn Skill>,
    enabled: bool,
}

/// Registry of all skills known to the platform.
pub struct SkillRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a skill, enabled by default. Re-registering an id replaces
    /// the previous skill.
    pub fn register(&self, skill: Arc<dyn Skill>) {
        let id = skill.id().to_string();
        debug!(skill = %id, "skill registered");
        self.entries.write().unwrap().insert(
            id,
            Entry {
                skill,
                enabled: true,
            },
        );
    }

    /// Look up an enabled skill. Returns `None` for unknown ids.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Skill>> {
        self.entries
            .read()
            .unwrap()
            .get(id)
            .map(|e| Arc::clone(&e.skill))
    }

    /// Whether an id is registered at all.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().unwrap().contains_key(id)
    }

    /// Whether an id is registered and enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries
            .read()
            .unwrap()
            .get(id)
            .map(|e| e.enabled)
            .unwrap_or(false)
    }

    /// Set the enabled flag. Unknown ids are ignored.
    pub fn set_enabled(&self, id: &str, enabled: bool) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(id) {
            entry.enabled = enabled;
        }
    }

    /// Provider function-calling definitions for a set of skill ids.
    /// Unknown or disabled ids are silently omitted.
    pub fn definitions(&self, ids: &[String]) -> Vec<ToolDefinition> {
        let entries = self.entries.read().unwrap();
        ids.iter()
            .filter_map(|id| entries.get(id))
            .filter(|e| e.enabled)
            .map(|e| {
                ToolDefinition::new(e.skill.id(), e.skill.description(), e.skill.parameters())
            })
            .collect()
    }

    /// All registered skill ids.
    pub fn ids(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
