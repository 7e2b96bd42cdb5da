//! Skills module - callable capabilities exposed to agents
//!
//! Skills implement the [`Skill`] trait and live in a [`SkillRegistry`]
//! with per-skill enabled flags. Built-ins cover echo, HTTP fetch and
//! self-scheduling; custom skills are declarative HTTP request templates
//! from config. The `delegate` skill is constructed by the agent manager
//! because it needs a handle back into the registry of live agents.

pub mod builtin;
pub mod custom;
mod registry;
mod types;

pub use builtin::{EchoSkill, HttpFetchSkill, ScheduleSkill};
pub use custom::CustomSkill;
pub use registry::SkillRegistry;
pub use types::{BindReport, BindSkipReason, Skill, SkillContext};

use std::sync::Arc;

use crate::config::Config;
use crate::store::PlatformStore;

/// Build the platform registry: built-ins plus declarative custom skills.
pub fn build_registry(config: &Config, store: PlatformStore) -> Arc<SkillRegistry> {
    let registry = Arc::new(SkillRegistry::new());
    registry.register(Arc::new(EchoSkill));
    registry.register(Arc::new(HttpFetchSkill::new()));
    registry.register(Arc::new(ScheduleSkill::new(store)));

    for def in &config.custom_skills {
        registry.register(Arc::new(CustomSkill::new(def.clone())));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registry_with_custom_skills() {
        let mut config = Config::default();
        config.custom_skills.push(crate::config::CustomSkillDef {
            id: "ping".to_string(),
            description: "Ping a service".to_string(),
            version: "1.0.0".to_string(),
            method: "GET".to_string(),
            url: "https://example.com/ping".to_string(),
            body: None,
            headers: Default::default(),
            parameters: vec![],
        });

        let store = PlatformStore::open_in_memory().unwrap();
        let registry = build_registry(&config, store);

        for id in ["echo", "http_fetch", "schedule", "ping"] {
            assert!(registry.contains(id), "missing {}", id);
        }
    }
}
