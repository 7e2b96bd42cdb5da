//! Token estimation heuristics.
//!
//! Every budget decision in the platform (knowledge blocks, context
//! assembly) runs through these estimates. The heuristic is chars/4,
//! rounded up, which tracks real tokenizers closely enough for budgeting
//! without pulling in a tokenizer dependency.

use tracing::warn;

use crate::providers::{ChatMessage, ToolDefinition};

/// Default context window ceiling, in estimated tokens.
pub const CONTEXT_TOKEN_LIMIT: u32 = 180_000;

/// Fraction of the budget at which a warning is emitted.
const WARN_THRESHOLD: f64 = 0.8;

/// Fixed per-message overhead covering role markers and separators.
const PER_MESSAGE_OVERHEAD: u32 = 4;

/// Estimate the token count of a text: ceil(chars / 4).
pub fn estimate_text(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(4)
}

/// Estimate the token count of a conversation, including per-message
/// overhead and any recorded tool-call arguments.
pub fn estimate_messages(messages: &[ChatMessage]) -> u32 {
    messages
        .iter()
        .map(|m| {
            let mut tokens = estimate_text(&m.content) + PER_MESSAGE_OVERHEAD;
            if let Some(calls) = &m.tool_calls {
                for call in calls {
                    tokens += estimate_text(&call.name) + estimate_text(&call.arguments);
                }
            }
            tokens
        })
        .sum()
}

/// Estimate the token cost of tool schemas as sent to the provider.
pub fn estimate_tool_schemas(tools: &[ToolDefinition]) -> u32 {
    tools
        .iter()
        .map(|t| {
            let schema = serde_json::to_string(&t.parameters).unwrap_or_default();
            estimate_text(&t.name) + estimate_text(&t.description) + estimate_text(&schema)
        })
        .sum()
}

/// Tracks cumulative estimated usage against a fixed budget.
#[derive(Debug)]
pub struct ContextBudget {
    limit: u32,
    used: u32,
    warned: bool,
}

impl ContextBudget {
    /// Create a budget with the default context limit.
    pub fn new() -> Self {
        Self::with_limit(CONTEXT_TOKEN_LIMIT)
    }

    /// Create a budget with a custom limit.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            used: 0,
            warned: false,
        }
    }

    /// Record estimated usage. Warns once when usage crosses 80% of the
    /// limit.
    pub fn consume(&mut self, tokens: u32) {
        self.used = self.used.saturating_add(tokens);
        if !self.warned && f64::from(self.used) > f64::from(self.limit) * WARN_THRESHOLD {
            warn!(
                used = self.used,
                limit = self.limit,
                "context token usage crossed 80% of budget"
            );
            self.warned = true;
        }
    }

    /// Remaining budget in estimated tokens.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    /// Whether `tokens` more would still fit.
    pub fn fits(&self, tokens: u32) -> bool {
        tokens <= self.remaining()
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::new()
    }
}
