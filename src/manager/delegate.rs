//! The delegate skill: agent-to-agent handoff.
//!
//! Registered by the manager because it needs a handle back into the live
//! agent map. Each hop carries a delegation path and depth in message
//! metadata; cycles and over-deep chains are rejected before the target
//! agent is invoked.

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Result, RoostError};
use crate::skills::{Skill, SkillContext};

use super::AgentManager;

/// Maximum number of delegation hops in one chain.
pub const MAX_DELEGATION_DEPTH: u32 = 5;

/// Channel label delegated turns run on.
pub const DELEGATE_CHANNEL: &str = "delegate";

pub struct DelegateSkill {
    manager: Weak<AgentManager>,
}

impl DelegateSkill {
    pub fn new(manager: Weak<AgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Skill for DelegateSkill {
    fn id(&self) -> &str {
        "delegate"
    }

    fn description(&self) -> &str {
        "Send a message to another agent and return its reply"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string", "description": "Target agent id" },
                "message": { "type": "string", "description": "Message for the target agent" }
            },
            "required": ["agent_id", "message"]
        })
    }

    async fn execute(&self, args: Value, ctx: &SkillContext) -> Result<String> {
        let target_id = args
            .get("agent_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RoostError::Skill("delegate requires an 'agent_id' argument".to_string())
            })?;
        let message = args.get("message").and_then(Value::as_str).ok_or_else(|| {
            RoostError::Skill("delegate requires a 'message' argument".to_string())
        })?;

        let depth = ctx.delegation_depth();
        if depth >= MAX_DELEGATION_DEPTH {
            return Err(RoostError::Skill(format!(
                "delegation depth limit ({}) reached",
                MAX_DELEGATION_DEPTH
            )));
        }

        // Path of agent ids visited so far, starting with the caller.
        let mut path: Vec<String> = ctx
            .metadata
            .get("delegation_path")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if path.is_empty() {
            path.push(ctx.agent_id.clone());
        }
        if path.iter().any(|id| id == target_id) {
            return Err(RoostError::Skill(format!(
                "delegation cycle detected: {} is already in the chain",
                target_id
            )));
        }
        path.push(target_id.to_string());

        let manager = self
            .manager
            .upgrade()
            .ok_or_else(|| RoostError::Skill("agent manager is shut down".to_string()))?;
        let target = manager
            .get_agent(target_id)
            .ok_or_else(|| RoostError::NotFound(format!("agent {}", target_id)))?;

        info!(from = %ctx.agent_id, to = %target_id, depth = depth + 1, "delegating message");

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("delegation_depth".to_string(), json!(depth + 1));
        metadata.insert("delegation_path".to_string(), json!(path));
        metadata.insert("delegated_by".to_string(), json!(ctx.agent_id));

        target
            .process_with_metadata(DELEGATE_CHANNEL, message, metadata)
            .await
    }
}
