//! Agent manager - lifecycle and access control for the agent fleet
//!
//! The manager owns the map of live [`Agent`] instances and is the only
//! place agents are created, updated, restored or deleted. Ownership is
//! tracked through permission rows; the reserved `admin` user sees every
//! agent. The `delegate` skill is registered here because it needs a weak
//! handle back into the live map.

mod delegate;

pub use delegate::{DelegateSkill, DELEGATE_CHANNEL, MAX_DELEGATION_DEPTH};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::agent::{Agent, AgentConfig, AgentDraft, AgentStatus, AgentUpdate};
use crate::config::Config;
use crate::error::{Result, RoostError};
use crate::knowledge::KnowledgeManager;
use crate::memory;
use crate::providers::ProviderRegistry;
use crate::skills::{BindReport, SkillRegistry};
use crate::store::PlatformStore;

/// Reserved user id with access to every agent.
pub const ADMIN_USER: &str = "admin";

/// Permission role granted to an agent's owner.
const OWNER_ROLE: &str = "owner";

pub struct AgentManager {
    config: Arc<Config>,
    store: PlatformStore,
    skills: Arc<SkillRegistry>,
    providers: Arc<ProviderRegistry>,
    knowledge: Arc<KnowledgeManager>,
    agents: RwLock<HashMap<String, Arc<Agent>>>,
}

impl AgentManager {
    /// Build the manager and register the `delegate` skill against it.
    pub fn new(
        config: Arc<Config>,
        store: PlatformStore,
        skills: Arc<SkillRegistry>,
        providers: Arc<ProviderRegistry>,
        knowledge: Arc<KnowledgeManager>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            config,
            store,
            skills,
            providers,
            knowledge,
            agents: RwLock::new(HashMap::new()),
        });
        manager
            .skills
            .register(Arc::new(DelegateSkill::new(Arc::downgrade(&manager))));
        manager
    }

    pub fn store(&self) -> &PlatformStore {
        &self.store
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeManager> {
        &self.knowledge
    }

    pub fn skills(&self) -> &Arc<SkillRegistry> {
        &self.skills
    }

    /// Create a new agent owned by `owner_id`.
    pub fn create_agent(
        &self,
        draft: AgentDraft,
        owner_id: &str,
    ) -> Result<(Arc<Agent>, BindReport)> {
        if draft.name.trim().is_empty() {
            return Err(RoostError::Agent("agent name must not be empty".to_string()));
        }
        let config = draft.into_config(&self.config.agents.defaults, owner_id, None);
        self.spawn_instance(config)
    }

    /// Create a sub-agent under `parent_id`, inheriting its owner.
    pub fn spawn_sub_agent(
        &self,
        parent_id: &str,
        draft: AgentDraft,
    ) -> Result<(Arc<Agent>, BindReport)> {
        let parent = self
            .store
            .get_agent(parent_id)?
            .ok_or_else(|| RoostError::NotFound(format!("agent {}", parent_id)))?;
        let config = draft.into_config(
            &self.config.agents.defaults,
            &parent.owner_id,
            Some(parent_id.to_string()),
        );
        self.spawn_instance(config)
    }

    fn spawn_instance(&self, config: AgentConfig) -> Result<(Arc<Agent>, BindReport)> {
        let store = memory::open(&config.id, &config.memory, &self.config.memory_dir())?;
        let (agent, report) = Agent::new(
            config.clone(),
            store,
            Arc::clone(&self.skills),
            Arc::clone(&self.providers),
            Arc::clone(&self.knowledge),
        );
        for (id, reason) in &report.skipped {
            warn!(agent_id = %config.id, skill = %id, %reason, "skill not bound");
        }

        self.store.save_agent(&config)?;
        self.store
            .grant_permission(&config.id, &config.owner_id, OWNER_ROLE)?;

        let agent = Arc::new(agent);
        self.agents
            .write()
            .unwrap()
            .insert(config.id.clone(), Arc::clone(&agent));
        info!(agent_id = %config.id, name = %config.name, owner = %config.owner_id, "agent started");
        Ok((agent, report))
    }

    pub fn get_agent(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents.read().unwrap().get(id).cloned()
    }

    /// Live agent or a `NotFound` error.
    pub fn require_agent(&self, id: &str) -> Result<Arc<Agent>> {
        self.get_agent(id)
            .ok_or_else(|| RoostError::NotFound(format!("agent {}", id)))
    }

    /// Ids of all live agents.
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.read().unwrap().keys().cloned().collect()
    }

    /// Whether `user_id` may operate on `agent_id`.
    pub fn can_access_agent(&self, user_id: &str, agent_id: &str) -> Result<bool> {
        if user_id == ADMIN_USER {
            return Ok(true);
        }
        Ok(self.store.get_permission(agent_id, user_id)?.is_some())
    }

    /// Agent configs visible to a user. Admin sees everything.
    pub fn get_agents_for_user(&self, user_id: &str) -> Result<Vec<AgentConfig>> {
        if user_id == ADMIN_USER {
            return self.store.list_agents();
        }
        let mut configs = Vec::new();
        for id in self.store.list_permitted_agents(user_id)? {
            if let Some(config) = self.store.get_agent(&id)? {
                configs.push(config);
            }
        }
        Ok(configs)
    }

    /// Apply a partial update, rebind skills and persist the result.
    pub fn update_agent(&self, id: &str, update: AgentUpdate) -> Result<(AgentConfig, BindReport)> {
        let agent = self.require_agent(id)?;
        let (config, report) = agent.apply_update(update);
        self.store.save_agent(&config)?;
        Ok((config, report))
    }

    /// Stop a live agent and persist the status. Idempotent.
    pub fn stop_agent(&self, id: &str) -> Result<()> {
        let agent = self.require_agent(id)?;
        agent.stop();
        self.store.set_agent_status(id, AgentStatus::Stopped)?;
        Ok(())
    }

    /// Delete an agent: stop it, close its memory and remove its rows and
    /// scheduled tasks. Knowledge items are retained for later sharing.
    pub async fn delete_agent(&self, id: &str) -> Result<()> {
        let agent = self.agents.write().unwrap().remove(id);
        if let Some(agent) = &agent {
            agent.stop();
            if let Err(e) = agent.memory().close().await {
                warn!(agent_id = %id, error = %e, "memory close failed");
            }
        }

        if self.store.get_agent(id)?.is_none() && agent.is_none() {
            return Err(RoostError::NotFound(format!("agent {}", id)));
        }

        self.store.delete_tasks_for_agent(id)?;
        self.store.delete_agent(id)?;
        info!(agent_id = %id, "agent deleted");
        Ok(())
    }

    /// Restore persisted agents at startup.
    ///
    /// Legacy JSON definitions under the agents directory are imported
    /// first and win over store rows; then every agent whose persisted
    /// status is `running` gets a live instance. Returns the number of
    /// instances started.
    pub fn load_persisted(&self) -> Result<usize> {
        self.import_legacy_definitions()?;

        let mut started = 0;
        for config in self.store.list_agents_by_status(AgentStatus::Running)? {
            if self.get_agent(&config.id).is_some() {
                continue;
            }
            match self.spawn_instance(config.clone()) {
                Ok(_) => started += 1,
                Err(e) => warn!(agent_id = %config.id, error = %e, "failed to restore agent"),
            }
        }
        info!(started, "persisted agents restored");
        Ok(started)
    }

    /// Import `*.json` agent definitions left by older deployments.
    fn import_legacy_definitions(&self) -> Result<()> {
        let dir = self.config.agents_dir();
        if !dir.is_dir() {
            return Ok(());
        }
        let pattern = dir.join("*.json");
        for entry in glob::glob(&pattern.to_string_lossy())
            .map_err(|e| RoostError::Config(e.to_string()))?
            .flatten()
        {
            let content = std::fs::read_to_string(&entry)?;
            match serde_json::from_str::<AgentConfig>(&content) {
                Ok(config) => {
                    info!(agent_id = %config.id, path = %entry.display(), "imported legacy agent definition");
                    self.store.save_agent(&config)?;
                }
                Err(e) => {
                    warn!(path = %entry.display(), error = %e, "skipping unreadable agent definition")
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills;

    fn test_config(dir: &std::path::Path) -> Arc<Config> {
        let mut config = Config::default();
        config.agents.defaults.memory_backend = "buffer".to_string();
        config.storage.memory_dir = dir.join("memory").to_string_lossy().to_string();
        config.storage.agents_dir = dir.join("agents").to_string_lossy().to_string();
        Arc::new(config)
    }

    fn build_manager(dir: &std::path::Path, store: PlatformStore) -> Arc<AgentManager> {
        let config = test_config(dir);
        let providers = Arc::new(ProviderRegistry::new());
        let skills = skills::build_registry(&config, store.clone());
        let knowledge = Arc::new(KnowledgeManager::new(store.clone(), Arc::clone(&providers)));
        AgentManager::new(config, store, skills, providers, knowledge)
    }

    fn draft(name: &str) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_agent_grants_owner_access() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), PlatformStore::open_in_memory().unwrap());

        let (agent, report) = manager.create_agent(draft("helper"), "user-1").unwrap();
        assert!(report.is_complete());
        let id = agent.id();

        assert!(manager.can_access_agent("user-1", &id).unwrap());
        assert!(!manager.can_access_agent("user-2", &id).unwrap());
        assert!(manager.can_access_agent(ADMIN_USER, &id).unwrap());

        let visible = manager.get_agents_for_user("user-1").unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, id);
        assert!(manager.get_agents_for_user("user-2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_agent_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), PlatformStore::open_in_memory().unwrap());
        assert!(manager.create_agent(draft("  "), "user-1").is_err());
    }

    #[tokio::test]
    async fn test_delegate_skill_registered() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), PlatformStore::open_in_memory().unwrap());
        assert!(manager.skills().contains("delegate"));
    }

    #[tokio::test]
    async fn test_spawn_sub_agent_inherits_owner() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), PlatformStore::open_in_memory().unwrap());

        let (parent, _) = manager.create_agent(draft("parent"), "user-1").unwrap();
        let (child, _) = manager
            .spawn_sub_agent(&parent.id(), draft("child"))
            .unwrap();

        let config = child.config();
        assert_eq!(config.owner_id, "user-1");
        assert_eq!(config.parent_agent_id.as_deref(), Some(parent.id().as_str()));
        assert!(manager.can_access_agent("user-1", &child.id()).unwrap());
    }

    #[tokio::test]
    async fn test_update_agent_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlatformStore::open_in_memory().unwrap();
        let manager = build_manager(dir.path(), store.clone());

        let (agent, _) = manager.create_agent(draft("before"), "user-1").unwrap();
        let (config, _) = manager
            .update_agent(
                &agent.id(),
                AgentUpdate {
                    name: Some("after".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(config.name, "after");

        let stored = store.get_agent(&agent.id()).unwrap().unwrap();
        assert_eq!(stored.name, "after");
    }

    #[tokio::test]
    async fn test_delete_agent_removes_rows_but_keeps_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlatformStore::open_in_memory().unwrap();
        let manager = build_manager(dir.path(), store.clone());

        let (agent, _) = manager.create_agent(draft("doomed"), "user-1").unwrap();
        let id = agent.id();

        manager
            .knowledge()
            .ingest_file(&id, "notes.txt", "keep me", "gpt-4o")
            .await
            .unwrap();
        store
            .save_task(&crate::store::ScheduledTask::new(
                &id,
                "job",
                crate::store::TaskType::Monitoring,
                "0 9 * * *",
            ))
            .unwrap();

        manager.delete_agent(&id).await.unwrap();

        assert!(manager.get_agent(&id).is_none());
        assert!(store.get_agent(&id).unwrap().is_none());
        assert!(store.list_tasks_for_agent(&id).unwrap().is_empty());
        assert!(!manager.can_access_agent("user-1", &id).unwrap());
        // Knowledge survives deletion for later sharing
        assert_eq!(manager.knowledge().list_items(&id).unwrap().len(), 1);

        assert!(matches!(
            manager.delete_agent(&id).await,
            Err(RoostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_agent_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlatformStore::open_in_memory().unwrap();
        let manager = build_manager(dir.path(), store.clone());

        let (agent, _) = manager.create_agent(draft("sleepy"), "user-1").unwrap();
        manager.stop_agent(&agent.id()).unwrap();
        manager.stop_agent(&agent.id()).unwrap();

        assert!(agent.is_stopped());
        let stored = store.get_agent(&agent.id()).unwrap().unwrap();
        assert_eq!(stored.status, AgentStatus::Stopped);
    }

    #[tokio::test]
    async fn test_load_persisted_restores_running_agents() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlatformStore::open_in_memory().unwrap();

        let first = build_manager(dir.path(), store.clone());
        let (running, _) = first.create_agent(draft("running"), "user-1").unwrap();
        let (stopped, _) = first.create_agent(draft("stopped"), "user-1").unwrap();
        first.stop_agent(&stopped.id()).unwrap();

        let second = build_manager(dir.path(), store);
        let started = second.load_persisted().unwrap();
        assert_eq!(started, 1);
        assert!(second.get_agent(&running.id()).is_some());
        assert!(second.get_agent(&stopped.id()).is_none());
    }

    #[tokio::test]
    async fn test_load_persisted_imports_legacy_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlatformStore::open_in_memory().unwrap();
        let manager = build_manager(dir.path(), store.clone());

        let config = draft("legacy").into_config(
            &crate::config::AgentDefaults {
                memory_backend: "buffer".to_string(),
                ..Default::default()
            },
            "user-1",
            None,
        );
        let agents_dir = dir.path().join("agents");
        std::fs::create_dir_all(&agents_dir).unwrap();
        std::fs::write(
            agents_dir.join(format!("{}.json", config.id)),
            serde_json::to_string(&config).unwrap(),
        )
        .unwrap();

        let started = manager.load_persisted().unwrap();
        assert_eq!(started, 1);
        let restored = manager.get_agent(&config.id).unwrap();
        assert_eq!(restored.config().name, "legacy");
    }

    #[tokio::test]
    async fn test_delegate_routes_to_target_agent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), PlatformStore::open_in_memory().unwrap());

        let (caller, _) = manager.create_agent(draft("caller"), "user-1").unwrap();
        let (target, _) = manager.create_agent(draft("target"), "user-1").unwrap();

        let skill = manager.skills().get("delegate").unwrap();
        let ctx = crate::skills::SkillContext::new(&caller.id(), "cli");

        // Without a provider the target answers with its diagnostic reply,
        // which is enough to prove the turn ran end to end.
        let reply = skill
            .execute(
                serde_json::json!({"agent_id": target.id(), "message": "hi"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(reply.contains("No LLM provider"));

        let history = target.memory().get_messages(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].channel, DELEGATE_CHANNEL);
    }

    #[tokio::test]
    async fn test_delegate_rejects_cycles_and_depth() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), PlatformStore::open_in_memory().unwrap());

        let (caller, _) = manager.create_agent(draft("caller"), "user-1").unwrap();
        let skill = manager.skills().get("delegate").unwrap();

        // Self-delegation is a cycle of length one
        let ctx = crate::skills::SkillContext::new(&caller.id(), "cli");
        let err = skill
            .execute(
                serde_json::json!({"agent_id": caller.id(), "message": "hi"}),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));

        // Depth cap
        let mut deep = crate::skills::SkillContext::new(&caller.id(), "cli");
        deep.metadata.insert(
            "delegation_depth".to_string(),
            serde_json::json!(MAX_DELEGATION_DEPTH),
        );
        let err = skill
            .execute(
                serde_json::json!({"agent_id": "someone", "message": "hi"}),
                &deep,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("depth limit"));
    }
}
