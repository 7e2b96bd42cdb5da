//! Skill types.
//!
//! Skills are the callable units exposed to agents through provider
//! function-calling. Each skill describes itself with a JSON-schema
//! parameter object and executes against a per-call context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

/// Execution context passed to a skill invocation.
#[derive(Debug, Clone, Default)]
pub struct SkillContext {
    /// Agent executing the call
    pub agent_id: String,
    /// Channel of the triggering message
    pub channel: String,
    /// Metadata propagated from the triggering message (delegation depth,
    /// task ids, ...)
    pub metadata: HashMap<String, Value>,
}

impl SkillContext {
    pub fn new(agent_id: &str, channel: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            channel: channel.to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Delegation depth carried in metadata, zero when absent.
    pub fn delegation_depth(&self) -> u32 {
        self.metadata
            .get("delegation_depth")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }
}

/// A capability an agent can invoke through tool calling.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Stable identifier used in agent configs and provider schemas.
    fn id(&self) -> &str;

    /// Display name; defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    fn description(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    /// JSON Schema object describing the arguments.
    fn parameters(&self) -> Value;

    /// Execute with JSON arguments. Errors are contained by the caller
    /// and surfaced to the model as error results.
    async fn execute(&self, args: Value, ctx: &SkillContext) -> Result<String>;
}

/// Why a configured skill id was not bound to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindSkipReason {
    NotFound,
    Disabled,
}

impl std::fmt::Display for BindSkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindSkipReason::NotFound => write!(f, "not found"),
            BindSkipReason::Disabled => write!(f, "disabled"),
        }
    }
}

/// Outcome of binding an agent's configured skill list.
#[derive(Debug, Clone, Default)]
pub struct BindReport {
    /// Skill ids bound successfully
    pub bound: Vec<String>,
    /// Skill ids skipped, with reasons
    pub skipped: Vec<(String, BindSkipReason)>,
}

impl BindReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegation_depth_default() {
        let ctx = SkillContext::new("a1", "cli");
        assert_eq!(ctx.delegation_depth(), 0);
    }

    #[test]
    fn test_delegation_depth_from_metadata() {
        let mut ctx = SkillContext::new("a1", "cli");
        ctx.metadata
            .insert("delegation_depth".to_string(), serde_json::json!(3));
        assert_eq!(ctx.delegation_depth(), 3);
    }

    #[test]
    fn test_bind_report() {
        let mut report = BindReport::default();
        assert!(report.is_complete());
        report
            .skipped
            .push(("missing".to_string(), BindSkipReason::NotFound));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(BindSkipReason::NotFound.to_string(), "not found");
        assert_eq!(BindSkipReason::Disabled.to_string(), "disabled");
    }
}
