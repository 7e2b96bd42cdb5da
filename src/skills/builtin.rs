//! Built-in skills: echo, http_fetch and schedule.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Result, RoostError};
use crate::scheduler::cron;
use crate::store::{PlatformStore, ScheduledTask, TaskType};
use crate::utils::string::preview;

use super::{Skill, SkillContext};

/// Maximum characters of a fetched body returned to the model.
const MAX_FETCH_CHARS: usize = 10_000;

/// Echo the input back. Mostly useful for wiring tests and demos.
pub struct EchoSkill;

#[async_trait]
impl Skill for EchoSkill {
    fn id(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back verbatim"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &SkillContext) -> Result<String> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| RoostError::Skill("echo requires a 'text' argument".to_string()))?;
        Ok(text.to_string())
    }
}

/// Fetch a URL with HTTP GET and return the (truncated) body.
pub struct HttpFetchSkill {
    client: reqwest::Client,
}

impl HttpFetchSkill {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetchSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for HttpFetchSkill {
    fn id(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetch the contents of a URL via HTTP GET"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &SkillContext) -> Result<String> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| RoostError::Skill("http_fetch requires a 'url' argument".to_string()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RoostError::Skill(format!("unsupported URL scheme: {}", url)));
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(format!("HTTP {}\n{}", status, preview(&body, MAX_FETCH_CHARS)))
    }
}

/// Let an agent schedule recurring work for itself.
///
/// Accepts either a raw 5-field cron expression or a natural-language
/// phrase resolved against the preset table.
pub struct ScheduleSkill {
    store: PlatformStore,
}

impl ScheduleSkill {
    pub fn new(store: PlatformStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Skill for ScheduleSkill {
    fn id(&self) -> &str {
        "schedule"
    }

    fn description(&self) -> &str {
        "Schedule a recurring task for this agent. Accepts a cron expression \
         or a phrase like 'daily at 9am'"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Short task name" },
                "schedule": {
                    "type": "string",
                    "description": "Cron expression (5 fields) or natural-language schedule"
                },
                "task_type": {
                    "type": "string",
                    "enum": ["social_post", "lead_followup", "content_gen", "monitoring"],
                    "description": "Task category (defaults to monitoring)"
                },
                "description": { "type": "string", "description": "What the task should do" }
            },
            "required": ["name", "schedule"]
        })
    }

    async fn execute(&self, args: Value, ctx: &SkillContext) -> Result<String> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RoostError::Skill("schedule requires a 'name' argument".to_string()))?;
        let schedule = args.get("schedule").and_then(Value::as_str).ok_or_else(|| {
            RoostError::Skill("schedule requires a 'schedule' argument".to_string())
        })?;

        let cron_expr = cron::resolve_expression(schedule)?;
        let next_run = cron::next_run_after(&cron_expr, chrono::Utc::now())?;

        let task_type = match args.get("task_type").and_then(Value::as_str) {
            Some(s) => TaskType::parse(s)?,
            None => TaskType::Monitoring,
        };

        let mut task = ScheduledTask::new(&ctx.agent_id, name, task_type, &cron_expr);
        task.description = args
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        task.next_run_at = Some(next_run);

        self.store.save_task(&task)?;
        info!(agent_id = %ctx.agent_id, task_id = %task.id, cron = %cron_expr, "task scheduled");

        Ok(format!(
            "Scheduled task '{}' ({}) with cron '{}', next run {}",
            name,
            task.id,
            cron_expr,
            next_run.to_rfc3339()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo() {
        let skill = EchoSkill;
        let ctx = SkillContext::new("a1", "cli");
        let out = skill
            .execute(json!({"text": "hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_echo_missing_arg() {
        let skill = EchoSkill;
        let ctx = SkillContext::new("a1", "cli");
        assert!(skill.execute(json!({}), &ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_bad_scheme() {
        let skill = HttpFetchSkill::new();
        let ctx = SkillContext::new("a1", "cli");
        let err = skill
            .execute(json!({"url": "file:///etc/passwd"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[tokio::test]
    async fn test_schedule_creates_task() {
        let store = PlatformStore::open_in_memory().unwrap();
        let skill = ScheduleSkill::new(store.clone());
        let ctx = SkillContext::new("a1", "cli");

        let out = skill
            .execute(
                json!({"name": "check feeds", "schedule": "0 9 * * *", "task_type": "monitoring"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(out.contains("check feeds"));

        let tasks = store.list_tasks_for_agent("a1").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].cron_expr, "0 9 * * *");
        assert!(tasks[0].next_run_at.is_some());
    }

    #[tokio::test]
    async fn test_schedule_rejects_unknown_task_type() {
        let store = PlatformStore::open_in_memory().unwrap();
        let skill = ScheduleSkill::new(store.clone());
        let ctx = SkillContext::new("a1", "cli");

        let err = skill
            .execute(
                json!({
                    "name": "odd",
                    "schedule": "0 9 * * *",
                    "task_type": "definitely-not-registered"
                }),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown task type"));
        assert!(store.list_tasks_for_agent("a1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_rejects_bad_expression() {
        let store = PlatformStore::open_in_memory().unwrap();
        let skill = ScheduleSkill::new(store);
        let ctx = SkillContext::new("a1", "cli");

        let result = skill
            .execute(json!({"name": "bad", "schedule": "whenever I feel like it"}), &ctx)
            .await;
        assert!(result.is_err());
    }
}
