//! Agent and permission persistence.

use rusqlite::{params, OptionalExtension};

use crate::agent::{AgentConfig, AgentStatus};
use crate::error::Result;

use super::PlatformStore;

impl PlatformStore {
    /// Insert or replace an agent row. The full config is stored as JSON;
    /// owner, parent and status are mirrored into columns for querying.
    pub fn save_agent(&self, config: &AgentConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO agents
                (id, owner_id, parent_agent_id, status, config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                config.id,
                config.owner_id,
                config.parent_agent_id,
                config.status.as_str(),
                json,
                config.created_at.to_rfc3339(),
                config.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<AgentConfig>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT config FROM agents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn list_agents(&self) -> Result<Vec<AgentConfig>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT config FROM agents ORDER BY created_at")?;
        let rows: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    /// Agents whose persisted status matches, used at startup to restore
    /// running agents.
    pub fn list_agents_by_status(&self, status: AgentStatus) -> Result<Vec<AgentConfig>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT config FROM agents WHERE status = ?1 ORDER BY created_at")?;
        let rows: Vec<String> = stmt
            .query_map(params![status.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    pub fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE agents SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(())
    }

    /// Delete an agent and its permission rows. Knowledge items are
    /// deliberately retained.
    pub fn delete_agent(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        conn.execute(
            "DELETE FROM agent_permissions WHERE agent_id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------

    pub fn grant_permission(&self, agent_id: &str, user_id: &str, role: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO agent_permissions (agent_id, user_id, role, granted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![agent_id, user_id, role, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_permission(&self, agent_id: &str, user_id: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let role = conn
            .query_row(
                "SELECT role FROM agent_permissions WHERE agent_id = ?1 AND user_id = ?2",
                params![agent_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(role)
    }

    /// Ids of agents a user has any permission row for.
    pub fn list_permitted_agents(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT agent_id FROM agent_permissions WHERE user_id = ?1")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentDraft;
    use crate::config::AgentDefaults;

    fn agent(name: &str, owner: &str) -> AgentConfig {
        AgentDraft {
            name: name.to_string(),
            ..Default::default()
        }
        .into_config(&AgentDefaults::default(), owner, None)
    }

    #[test]
    fn test_save_and_get_agent() {
        let store = PlatformStore::open_in_memory().unwrap();
        let config = agent("helper", "user-1");
        store.save_agent(&config).unwrap();

        let loaded = store.get_agent(&config.id).unwrap().unwrap();
        assert_eq!(loaded.name, "helper");
        assert_eq!(loaded.owner_id, "user-1");
        assert_eq!(loaded.status, AgentStatus::Running);

        assert!(store.get_agent("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_agent_is_upsert() {
        let store = PlatformStore::open_in_memory().unwrap();
        let mut config = agent("before", "user-1");
        store.save_agent(&config).unwrap();
        config.name = "after".to_string();
        store.save_agent(&config).unwrap();

        assert_eq!(store.list_agents().unwrap().len(), 1);
        assert_eq!(store.get_agent(&config.id).unwrap().unwrap().name, "after");
    }

    #[test]
    fn test_list_by_status() {
        let store = PlatformStore::open_in_memory().unwrap();
        let a = agent("a", "u");
        let b = agent("b", "u");
        store.save_agent(&a).unwrap();
        store.save_agent(&b).unwrap();
        store.set_agent_status(&b.id, AgentStatus::Stopped).unwrap();

        let running = store.list_agents_by_status(AgentStatus::Running).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, a.id);
    }

    #[test]
    fn test_delete_agent_cascades_permissions() {
        let store = PlatformStore::open_in_memory().unwrap();
        let config = agent("helper", "user-1");
        store.save_agent(&config).unwrap();
        store
            .grant_permission(&config.id, "user-1", "owner")
            .unwrap();

        store.delete_agent(&config.id).unwrap();
        assert!(store.get_agent(&config.id).unwrap().is_none());
        assert!(store
            .get_permission(&config.id, "user-1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_permissions() {
        let store = PlatformStore::open_in_memory().unwrap();
        store.grant_permission("a1", "user-1", "owner").unwrap();
        store.grant_permission("a2", "user-1", "viewer").unwrap();

        assert_eq!(
            store.get_permission("a1", "user-1").unwrap().as_deref(),
            Some("owner")
        );
        assert!(store.get_permission("a1", "user-2").unwrap().is_none());

        let mut ids = store.list_permitted_agents("user-1").unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a1", "a2"]);
    }
}
