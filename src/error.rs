//! Error types for Roost
//!
//! This module defines all error types used throughout the Roost platform.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for Roost operations.
#[derive(Error, Debug)]
pub enum RoostError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors (API failures, rate limits, model errors, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Skill execution errors (invalid parameters, execution failures, etc.)
    #[error("Skill error: {0}")]
    Skill(String),

    /// Memory store errors (backend failures, corrupt logs, etc.)
    #[error("Memory error: {0}")]
    Memory(String),

    /// Knowledge subsystem errors (ingestion, extraction, budget assembly)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Platform store errors (schema, query failures)
    #[error("Store error: {0}")]
    Store(String),

    /// Scheduling errors (invalid cron expressions, task state issues)
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// Agent lifecycle errors (stopped agents, turn failures)
    #[error("Agent error: {0}")]
    Agent(String),

    /// Resource not found (agents, tasks, knowledge items, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authorization failures (non-owner access, missing permission rows)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite errors from the platform store and memory backend
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A specialized `Result` type for Roost operations.
pub type Result<T> = std::result::Result<T, RoostError>;
