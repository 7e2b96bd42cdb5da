//! Roost - single-process multi-tenant platform for LLM-backed agents

pub mod agent;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod manager;
pub mod memory;
pub mod providers;
pub mod scheduler;
pub mod skills;
pub mod store;
pub mod tokens;
pub mod utils;

pub use agent::{Agent, AgentConfig, AgentDraft, AgentStatus, AgentUpdate};
pub use config::Config;
pub use error::{Result, RoostError};
pub use manager::AgentManager;
pub use providers::{
    ChatMessage, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage,
};
pub use scheduler::TaskScheduler;
pub use store::PlatformStore;
