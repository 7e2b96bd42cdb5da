//! Prompt templates for autonomous task runs.
//!
//! Each task type renders the task's config map into the instruction the
//! agent receives when the scheduler fires. Templates are plain functions
//! of the task so runs are reproducible from the stored row.

use crate::store::{ScheduledTask, TaskType};

fn config_str<'a>(task: &'a ScheduledTask, key: &str) -> Option<&'a str> {
    task.config.get(key).and_then(|v| v.as_str())
}

/// Render the instruction prompt for one scheduled run.
pub fn render_prompt(task: &ScheduledTask) -> String {
    let mut prompt = match task.task_type {
        TaskType::SocialPost => {
            let platform = config_str(task, "platform").unwrap_or("social media");
            let topic = config_str(task, "topic").unwrap_or("recent activity");
            format!(
                "Draft a {} post about {}. Keep it concise and in the voice \
                 established by your system prompt.",
                platform, topic
            )
        }
        TaskType::LeadFollowup => {
            let segment = config_str(task, "segment").unwrap_or("open leads");
            format!(
                "Review {} and write a follow-up message for each lead that has \
                 been waiting for a reply. Prioritize the oldest.",
                segment
            )
        }
        TaskType::ContentGen => {
            let format = config_str(task, "format").unwrap_or("article");
            let topic = config_str(task, "topic").unwrap_or("a relevant topic");
            format!("Produce a {} draft on {}.", format, topic)
        }
        TaskType::Monitoring => {
            let target = config_str(task, "target").unwrap_or("your monitored sources");
            format!(
                "Check {} for changes since your last run and report anything \
                 noteworthy. If nothing changed, say so briefly.",
                target
            )
        }
    };

    if !task.description.is_empty() {
        prompt.push_str("\n\nTask notes: ");
        prompt.push_str(&task.description);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(task_type: TaskType) -> ScheduledTask {
        ScheduledTask::new("a1", "t", task_type, "0 9 * * *")
    }

    #[test]
    fn test_monitoring_uses_target() {
        let mut t = task(TaskType::Monitoring);
        t.config.insert("target".to_string(), json!("the status page"));
        let prompt = render_prompt(&t);
        assert!(prompt.contains("the status page"));
    }

    #[test]
    fn test_defaults_when_config_empty() {
        let prompt = render_prompt(&task(TaskType::SocialPost));
        assert!(prompt.contains("social media"));
    }

    #[test]
    fn test_description_appended() {
        let mut t = task(TaskType::ContentGen);
        t.description = "weekly newsletter".to_string();
        let prompt = render_prompt(&t);
        assert!(prompt.contains("Task notes: weekly newsletter"));
    }
}
