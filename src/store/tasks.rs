//! Scheduled task and execution log persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Result, RoostError};

use super::PlatformStore;

/// Built-in autonomous task categories, each with its own prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SocialPost,
    LeadFollowup,
    ContentGen,
    Monitoring,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SocialPost => "social_post",
            TaskType::LeadFollowup => "lead_followup",
            TaskType::ContentGen => "content_gen",
            TaskType::Monitoring => "monitoring",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "social_post" => Ok(TaskType::SocialPost),
            "lead_followup" => Ok(TaskType::LeadFollowup),
            "content_gen" => Ok(TaskType::ContentGen),
            "monitoring" => Ok(TaskType::Monitoring),
            other => Err(RoostError::Schedule(format!(
                "unknown task type '{}'; expected one of social_post, \
                 lead_followup, content_gen, monitoring",
                other
            ))),
        }
    }
}

/// A persisted recurring task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub task_type: TaskType,
    /// 5-field cron expression, validated before persist
    pub cron_expr: String,
    /// Display timezone label; evaluation runs in UTC
    pub timezone: String,
    /// Task-type specific configuration fed to the prompt template
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    pub fn new(agent_id: &str, name: &str, task_type: TaskType, cron_expr: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            name: name.to_string(),
            description: String::new(),
            task_type,
            cron_expr: cron_expr.to_string(),
            timezone: "UTC".to_string(),
            config: HashMap::new(),
            enabled: true,
            last_run_at: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome states of one task execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => ExecutionStatus::Running,
            "success" => ExecutionStatus::Success,
            "skipped" => ExecutionStatus::Skipped,
            _ => ExecutionStatus::Failed,
        }
    }
}

/// One row per execution attempt, completed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionLog {
    pub id: String,
    pub task_id: String,
    pub agent_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    /// Response summary, truncated to 1000 chars
    pub result: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
}

impl TaskExecutionLog {
    pub fn started(task_id: &str, agent_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            result: None,
            error: None,
            duration_ms: None,
        }
    }
}

fn parse_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<ScheduledTask> {
    let task_type: String = row.get(4)?;
    let config: String = row.get(7)?;
    let last_run_at: Option<String> = row.get(9)?;
    let next_run_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(ScheduledTask {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        task_type: TaskType::parse(&task_type).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        cron_expr: row.get(5)?,
        timezone: row.get(6)?,
        config: serde_json::from_str(&config).unwrap_or_default(),
        enabled: row.get::<_, i64>(8)? != 0,
        last_run_at: parse_ts(last_run_at),
        next_run_at: parse_ts(next_run_at),
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<TaskExecutionLog> {
    let started_at: String = row.get(3)?;
    let completed_at: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;

    Ok(TaskExecutionLog {
        id: row.get(0)?,
        task_id: row.get(1)?,
        agent_id: row.get(2)?,
        started_at: started_at.parse().unwrap_or_else(|_| Utc::now()),
        completed_at: parse_ts(completed_at),
        status: ExecutionStatus::parse(&status),
        result: row.get(6)?,
        error: row.get(7)?,
        duration_ms: row.get(8)?,
    })
}

const TASK_COLUMNS: &str = "id, agent_id, name, description, task_type, cron_expr, timezone, \
                            config, enabled, last_run_at, next_run_at, created_at, updated_at";

const LOG_COLUMNS: &str =
    "id, task_id, agent_id, started_at, completed_at, status, result, error, duration_ms";

impl PlatformStore {
    pub fn save_task(&self, task: &ScheduledTask) -> Result<()> {
        let config = serde_json::to_string(&task.config)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO scheduled_tasks
                (id, agent_id, name, description, task_type, cron_expr, timezone,
                 config, enabled, last_run_at, next_run_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id,
                task.agent_id,
                task.name,
                task.description,
                task.task_type.as_str(),
                task.cron_expr,
                task.timezone,
                config,
                task.enabled as i64,
                task.last_run_at.map(|t| t.to_rfc3339()),
                task.next_run_at.map(|t| t.to_rfc3339()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>> {
        let conn = self.lock()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM scheduled_tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scheduled_tasks ORDER BY created_at",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    pub fn list_tasks_for_agent(&self, agent_id: &str) -> Result<Vec<ScheduledTask>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scheduled_tasks WHERE agent_id = ?1 ORDER BY created_at",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![agent_id], row_to_task)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    /// Enabled tasks whose next run is at or before `now`.
    pub fn list_due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scheduled_tasks
             WHERE enabled = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![now.to_rfc3339()], row_to_task)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    /// Delete a task and cascade to its execution logs.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM scheduled_tasks WHERE id = ?1", params![id])?;
        conn.execute(
            "DELETE FROM task_execution_logs WHERE task_id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Delete all tasks owned by an agent (with their logs).
    pub fn delete_tasks_for_agent(&self, agent_id: &str) -> Result<()> {
        for task in self.list_tasks_for_agent(agent_id)? {
            self.delete_task(&task.id)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution logs
    // ------------------------------------------------------------------

    pub fn save_execution_log(&self, log: &TaskExecutionLog) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO task_execution_logs
                (id, task_id, agent_id, started_at, completed_at, status, result, error, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                log.id,
                log.task_id,
                log.agent_id,
                log.started_at.to_rfc3339(),
                log.completed_at.map(|t| t.to_rfc3339()),
                log.status.as_str(),
                log.result,
                log.error,
                log.duration_ms,
            ],
        )?;
        Ok(())
    }

    /// Most recent execution logs for a task, newest first.
    pub fn list_execution_logs(&self, task_id: &str, limit: usize) -> Result<Vec<TaskExecutionLog>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM task_execution_logs
             WHERE task_id = ?1 ORDER BY started_at DESC LIMIT ?2",
            LOG_COLUMNS
        ))?;
        let logs = stmt
            .query_map(params![task_id, limit as i64], row_to_log)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(logs)
    }
}
