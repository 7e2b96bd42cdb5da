//! Providers module - LLM providers behind a common trait
//!
//! This module defines the `LLMProvider` trait and common types for
//! interacting with LLM providers, plus a registry that routes model
//! identifiers to configured providers.
//!
//! # Example
//!
//! ```rust,ignore
//! use roost::providers::{ChatMessage, ChatOptions, LLMProvider, OpenAIProvider};
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key");
//!     let messages = vec![ChatMessage::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider.chat(messages, vec![], None, options).await.unwrap();
//!     println!("Response: {}", response.content);
//! }
//! ```

pub mod openai;
mod registry;
mod types;

pub use openai::OpenAIProvider;
pub use registry::ProviderRegistry;
pub use types::{
    ChatMessage, ChatOptions, ChatRole, LLMProvider, LLMResponse, LLMToolCall, ToolCallRecord,
    ToolDefinition, Usage,
};
