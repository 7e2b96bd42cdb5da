//! Agent module - the conversational core
//!
//! An [`Agent`] owns its configuration, a memory store and a set of bound
//! skills. `process_message` runs one full turn: persist the user message,
//! assemble context (system prompt, knowledge block, recent history),
//! drive the provider tool-calling loop and persist the final reply.
//! Turns on the same agent are serialized by an internal mutex.

mod config;

pub use config::{AgentConfig, AgentDraft, AgentStatus, AgentUpdate};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, RoostError};
use crate::knowledge::KnowledgeManager;
use crate::memory::{MemoryStore, MessageRecord};
use crate::providers::{
    ChatMessage, ChatOptions, ChatRole, LLMToolCall, ProviderRegistry, ToolCallRecord,
};
use crate::skills::{BindReport, BindSkipReason, SkillContext, SkillRegistry};
use crate::tokens::{self, ContextBudget};

/// Upper bound on provider round-trips within a single turn.
const MAX_TOOL_ROUNDS: usize = 25;

/// Reply used when no provider is configured for the agent's model.
const NO_PROVIDER_REPLY: &str =
    "No LLM provider is configured for this agent's model. Add an API key to \
     the platform configuration and restart.";

/// Reply used when a turn hits the tool round limit.
const ROUND_LIMIT_REPLY: &str =
    "I stopped this turn after reaching the tool call limit for a single message.";

/// A running agent instance.
pub struct Agent {
    config: RwLock<AgentConfig>,
    memory: Arc<dyn MemoryStore>,
    skills: Arc<SkillRegistry>,
    providers: Arc<ProviderRegistry>,
    knowledge: Arc<KnowledgeManager>,
    /// Skill ids that bound successfully at construction or last update
    bound: RwLock<Vec<String>>,
    /// Serializes turns; concurrent callers queue here
    turn: tokio::sync::Mutex<()>,
    stopped: AtomicBool,
}

impl Agent {
    /// Construct an agent and bind its configured skills.
    pub fn new(
        config: AgentConfig,
        memory: Arc<dyn MemoryStore>,
        skills: Arc<SkillRegistry>,
        providers: Arc<ProviderRegistry>,
        knowledge: Arc<KnowledgeManager>,
    ) -> (Self, BindReport) {
        let report = bind_skills(&skills, &config.skills);
        let stopped = config.status == AgentStatus::Stopped;
        let agent = Self {
            bound: RwLock::new(report.bound.clone()),
            config: RwLock::new(config),
            memory,
            skills,
            providers,
            knowledge,
            turn: tokio::sync::Mutex::new(()),
            stopped: AtomicBool::new(stopped),
        };
        (agent, report)
    }

    pub fn id(&self) -> String {
        self.config.read().unwrap().id.clone()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> AgentConfig {
        self.config.read().unwrap().clone()
    }

    /// Skill ids currently bound.
    pub fn bound_skills(&self) -> Vec<String> {
        self.bound.read().unwrap().clone()
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the agent. Idempotent; stopped agents reject new turns.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.config.write().unwrap().status = AgentStatus::Stopped;
    }

    /// Apply a partial config update and rebind skills.
    pub fn apply_update(&self, update: AgentUpdate) -> (AgentConfig, BindReport) {
        let snapshot = {
            let mut config = self.config.write().unwrap();
            config.merge(update);
            config.clone()
        };
        let report = bind_skills(&self.skills, &snapshot.skills);
        *self.bound.write().unwrap() = report.bound.clone();
        (snapshot, report)
    }

    /// Process one inbound message and return the agent's reply.
    pub async fn process_message(&self, channel: &str, text: &str) -> Result<String> {
        self.process_with_metadata(channel, text, Default::default())
            .await
    }

    /// Like [`process_message`](Self::process_message) but with caller
    /// metadata (delegation depth, task ids) propagated to skill calls.
    pub async fn process_with_metadata(
        &self,
        channel: &str,
        text: &str,
        metadata: std::collections::HashMap<String, Value>,
    ) -> Result<String> {
        if self.is_stopped() {
            return Err(RoostError::Agent(format!("agent {} is stopped", self.id())));
        }

        let _turn = self.turn.lock().await;
        let config = self.config();

        let mut user_record = MessageRecord::new(&config.id, channel, ChatRole::User, text);
        user_record.metadata = metadata.clone();
        self.memory.add_message(user_record).await?;

        let provider = match self.providers.resolve(&config.model) {
            Some(p) => p,
            None => {
                warn!(agent_id = %config.id, model = %config.model, "no provider for model");
                self.persist_reply(&config.id, channel, NO_PROVIDER_REPLY)
                    .await?;
                return Ok(NO_PROVIDER_REPLY.to_string());
            }
        };

        let mut transcript = self.build_context(&config).await?;
        let bound = self.bound_skills();
        let tools = self.skills.definitions(&bound);
        let options = ChatOptions::new()
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);

        let mut ctx = SkillContext::new(&config.id, channel);
        ctx.metadata = metadata;

        let mut budget = ContextBudget::with_limit(tokens::CONTEXT_TOKEN_LIMIT);
        let tool_cost = tokens::estimate_tool_schemas(&tools);

        for round in 0..MAX_TOOL_ROUNDS {
            // Track the growing transcript against the context ceiling;
            // tool schemas are resent with every request
            let estimate = tool_cost.saturating_add(tokens::estimate_messages(&transcript));
            budget.consume(estimate.saturating_sub(budget.used()));

            let response = provider
                .chat(
                    transcript.clone(),
                    tools.clone(),
                    Some(&config.model),
                    options.clone(),
                )
                .await?;

            if !response.has_tool_calls() {
                self.persist_reply(&config.id, channel, &response.content)
                    .await?;
                return Ok(response.content);
            }

            debug!(
                agent_id = %config.id,
                round,
                calls = response.tool_calls.len(),
                "executing tool calls"
            );

            let records: Vec<ToolCallRecord> = response
                .tool_calls
                .iter()
                .map(|c| ToolCallRecord::new(&c.id, &c.name, &c.arguments))
                .collect();
            transcript.push(ChatMessage::assistant_with_tools(&response.content, records));

            for call in &response.tool_calls {
                let result = self.run_tool(call, &ctx, &bound).await;
                transcript.push(ChatMessage::tool_result(&call.id, &result));
            }
        }

        warn!(agent_id = %config.id, "tool round limit reached");
        self.persist_reply(&config.id, channel, ROUND_LIMIT_REPLY)
            .await?;
        Ok(ROUND_LIMIT_REPLY.to_string())
    }

    /// System prompt, knowledge block and recent history, in that order.
    async fn build_context(&self, config: &AgentConfig) -> Result<Vec<ChatMessage>> {
        let mut system = config.system_prompt.clone();

        match self
            .knowledge
            .knowledge_block(&config.id, config.knowledge_token_budget)
        {
            Ok(block) if !block.is_empty() => {
                system.push_str("\n\n## Knowledge\n\n");
                system.push_str(&block);
            }
            Ok(_) => {}
            Err(e) => warn!(agent_id = %config.id, error = %e, "knowledge block failed"),
        }

        let mut messages = vec![ChatMessage::system(&system)];
        for record in self.memory.get_messages(config.history_limit).await? {
            // Only user and assistant text survives into context; tool
            // traffic is intra-turn and never persisted.
            let message = match record.role {
                ChatRole::User => ChatMessage::user(&record.content),
                ChatRole::Assistant => ChatMessage::assistant(&record.content),
                _ => continue,
            };
            messages.push(message);
        }
        Ok(messages)
    }

    /// Execute one tool call, containing every failure as a result string.
    async fn run_tool(&self, call: &LLMToolCall, ctx: &SkillContext, bound: &[String]) -> String {
        if !bound.iter().any(|id| id == &call.name) {
            return format!("Unknown tool: {}", call.name);
        }
        let skill = match self.skills.get(&call.name) {
            Some(s) if self.skills.is_enabled(&call.name) => s,
            _ => return format!("Unknown tool: {}", call.name),
        };

        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                return serde_json::json!({ "error": format!("invalid arguments: {}", e) })
                    .to_string()
            }
        };

        match skill.execute(args, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(skill = %call.name, error = %e, "skill execution failed");
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        }
    }

    async fn persist_reply(&self, agent_id: &str, channel: &str, content: &str) -> Result<()> {
        self.memory
            .add_message(MessageRecord::new(
                agent_id,
                channel,
                ChatRole::Assistant,
                content,
            ))
            .await
    }
}

/// Bind a configured skill list against the registry.
fn bind_skills(registry: &SkillRegistry, ids: &[String]) -> BindReport {
    let mut report = BindReport::default();
    for id in ids {
        if !registry.contains(id) {
            warn!(skill = %id, "configured skill not found, skipping");
            report.skipped.push((id.clone(), BindSkipReason::NotFound));
        } else if !registry.is_enabled(id) {
            info!(skill = %id, "configured skill disabled, skipping");
            report.skipped.push((id.clone(), BindSkipReason::Disabled));
        } else {
            report.bound.push(id.clone());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentDefaults;
    use crate::memory::BufferMemory;
    use crate::providers::{LLMProvider, LLMResponse, ToolDefinition};
    use crate::skills::EchoSkill;
    use crate::store::PlatformStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays a fixed script, then repeats a fallback.
    struct ScriptedProvider {
        script: Mutex<VecDeque<LLMResponse>>,
        fallback: LLMResponse,
    }

    impl ScriptedProvider {
        fn new(script: Vec<LLMResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: LLMResponse::text("done"),
            }
        }

        fn with_fallback(script: Vec<LLMResponse>, fallback: LLMResponse) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone()))
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn build_agent(provider: Option<Arc<dyn LLMProvider>>, skill_ids: Vec<String>) -> Agent {
        let mut registry = ProviderRegistry::new();
        if let Some(p) = provider {
            registry.register("scripted", vec!["test-".to_string()], p);
        }
        let providers = Arc::new(registry);

        let skills = Arc::new(SkillRegistry::new());
        skills.register(Arc::new(EchoSkill));

        let store = PlatformStore::open_in_memory().unwrap();
        let knowledge = Arc::new(KnowledgeManager::new(store, Arc::clone(&providers)));

        let draft = AgentDraft {
            name: "test agent".to_string(),
            model: Some("test-model".to_string()),
            skills: skill_ids,
            ..Default::default()
        };
        let config = draft.into_config(&AgentDefaults::default(), "user-1", None);

        let (agent, _) = Agent::new(
            config,
            Arc::new(BufferMemory::new(100)),
            skills,
            providers,
            knowledge,
        );
        agent
    }

    fn tool_call_response(name: &str, args: &str) -> LLMResponse {
        LLMResponse::with_tools("", vec![LLMToolCall::new("call_1", name, args)])
    }

    #[tokio::test]
    async fn test_plain_reply_persists_user_and_assistant() {
        let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse::text("hello back")]));
        let agent = build_agent(Some(provider), vec![]);

        let reply = agent.process_message("cli", "hello").await.unwrap();
        assert_eq!(reply, "hello back");

        let messages = agent.memory().get_messages(10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "hello back");
    }

    #[tokio::test]
    async fn test_tool_loop_executes_and_finishes() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("echo", r#"{"text": "ping"}"#),
            LLMResponse::text("final answer"),
        ]));
        let agent = build_agent(Some(provider), vec!["echo".to_string()]);

        let reply = agent.process_message("cli", "use the tool").await.unwrap();
        assert_eq!(reply, "final answer");

        // Only the user message and final reply are persisted
        let messages = agent.memory().get_messages(10).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("nonexistent", "{}"),
            LLMResponse::text("recovered"),
        ]));
        let agent = build_agent(Some(provider), vec!["echo".to_string()]);

        let reply = agent.process_message("cli", "go").await.unwrap();
        assert_eq!(reply, "recovered");
    }

    #[tokio::test]
    async fn test_unbound_skill_is_unknown_to_the_model() {
        // echo is registered but not in the agent's skill list
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("echo", r#"{"text": "x"}"#),
            LLMResponse::text("ok"),
        ]));
        let agent = build_agent(Some(provider), vec![]);

        let reply = agent.process_message("cli", "go").await.unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_round_limit_terminates_turn() {
        let provider = Arc::new(ScriptedProvider::with_fallback(
            vec![],
            tool_call_response("echo", r#"{"text": "again"}"#),
        ));
        let agent = build_agent(Some(provider), vec!["echo".to_string()]);

        let reply = agent.process_message("cli", "loop forever").await.unwrap();
        assert_eq!(reply, ROUND_LIMIT_REPLY);
    }

    #[tokio::test]
    async fn test_no_provider_yields_diagnostic_reply() {
        let agent = build_agent(None, vec![]);

        let reply = agent.process_message("cli", "hello").await.unwrap();
        assert_eq!(reply, NO_PROVIDER_REPLY);

        let messages = agent.memory().get_messages(10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, NO_PROVIDER_REPLY);
    }

    #[tokio::test]
    async fn test_stopped_agent_rejects_turns() {
        let agent = build_agent(None, vec![]);
        agent.stop();
        agent.stop(); // idempotent

        let err = agent.process_message("cli", "hello").await.unwrap_err();
        assert!(err.to_string().contains("stopped"));
        assert!(agent.memory().get_messages(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_update_rebinds_skills() {
        let agent = build_agent(None, vec!["echo".to_string()]);
        assert_eq!(agent.bound_skills(), vec!["echo"]);

        let (config, report) = agent.apply_update(AgentUpdate {
            skills: Some(vec!["echo".to_string(), "ghost".to_string()]),
            ..Default::default()
        });
        assert_eq!(config.skills.len(), 2);
        assert_eq!(report.bound, vec!["echo"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(agent.bound_skills(), vec!["echo"]);
    }

    #[test]
    fn test_bind_skills_report() {
        let registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill));
        registry.set_enabled("echo", false);

        let report = bind_skills(&registry, &["echo".to_string(), "missing".to_string()]);
        assert!(report.bound.is_empty());
        assert_eq!(
            report.skipped,
            vec![
                ("echo".to_string(), BindSkipReason::Disabled),
                ("missing".to_string(), BindSkipReason::NotFound),
            ]
        );
    }
}
