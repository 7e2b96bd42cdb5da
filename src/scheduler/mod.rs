//! Task scheduler - persistent cron-driven agent runs
//!
//! A single tick loop polls the store for due tasks and spawns one
//! execution per fire. A task never overlaps itself: a fire that arrives
//! while the previous run is still going is consumed and recorded as
//! `skipped`. Every attempt leaves exactly one execution log row.

pub mod cron;
pub mod templates;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Result, RoostError};
use crate::manager::AgentManager;
use crate::store::{ExecutionStatus, PlatformStore, ScheduledTask, TaskExecutionLog};
use crate::utils::string::prefix_chars;

/// Channel label scheduled runs use for agent turns.
pub const SCHEDULER_CHANNEL: &str = "scheduler";

/// Execution results are truncated to this many characters in the log.
const RESULT_TRUNCATE_CHARS: usize = 1000;

pub struct TaskScheduler {
    store: PlatformStore,
    manager: Arc<AgentManager>,
    config: SchedulerConfig,
    /// Task ids currently executing, the non-overlap guard
    running: Mutex<HashSet<String>>,
    shutdown: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(
        store: PlatformStore,
        manager: Arc<AgentManager>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            manager,
            config,
            running: Mutex::new(HashSet::new()),
            shutdown: AtomicBool::new(false),
            handle: Mutex::new(None),
        })
    }

    /// Start the tick loop. Calling twice replaces nothing; the second
    /// call is ignored.
    pub fn start(self: Arc<Self>) {
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            return;
        }

        let scheduler = Arc::clone(&self);
        let interval = Duration::from_secs(self.config.tick_interval_secs.max(1));
        *handle = Some(tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "scheduler started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if scheduler.shutdown.load(Ordering::SeqCst) {
                    info!("scheduler stopped");
                    break;
                }
                Arc::clone(&scheduler).tick();
            }
        }));
    }

    /// Signal the loop to exit at the next tick. In-flight executions
    /// complete normally.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// One scheduling pass: spawn an execution for every due task.
    fn tick(self: Arc<Self>) {
        let due = match self.store.list_due_tasks(Utc::now()) {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "failed to list due tasks");
                return;
            }
        };

        for task in due {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.run_task(task).await;
            });
        }
    }

    /// Run one fire of a task, enforcing the non-overlap guard.
    async fn run_task(&self, task: ScheduledTask) {
        if !self.try_begin(&task.id) {
            debug!(task_id = %task.id, "previous run still active, skipping fire");
            if let Err(e) = self.record_skip(&task) {
                error!(task_id = %task.id, error = %e, "failed to record skipped fire");
            }
            return;
        }

        let result = self.execute_task(&task).await;
        self.finish(&task.id);

        if let Err(e) = result {
            error!(task_id = %task.id, error = %e, "task execution bookkeeping failed");
        }
    }

    /// Execute a task immediately, bypassing the cron check but not the
    /// overlap guard. Returns the completed log row.
    pub async fn run_now(&self, task_id: &str) -> Result<TaskExecutionLog> {
        let task = self
            .store
            .get_task(task_id)?
            .ok_or_else(|| RoostError::NotFound(format!("task {}", task_id)))?;

        if !self.try_begin(&task.id) {
            return Err(RoostError::Schedule(format!(
                "task {} is already running",
                task.id
            )));
        }
        let result = self.execute_task(&task).await;
        self.finish(&task.id);
        result
    }

    /// Enable a task and recompute its next fire. Idempotent.
    pub fn enable_task(&self, task_id: &str) -> Result<ScheduledTask> {
        self.set_enabled(task_id, true)
    }

    /// Disable a task. Idempotent; a running execution finishes normally.
    pub fn disable_task(&self, task_id: &str) -> Result<ScheduledTask> {
        self.set_enabled(task_id, false)
    }

    fn set_enabled(&self, task_id: &str, enabled: bool) -> Result<ScheduledTask> {
        let mut task = self
            .store
            .get_task(task_id)?
            .ok_or_else(|| RoostError::NotFound(format!("task {}", task_id)))?;

        task.enabled = enabled;
        if enabled {
            task.next_run_at = Some(cron::next_run_after(&task.cron_expr, Utc::now())?);
        }
        task.updated_at = Utc::now();
        self.store.save_task(&task)?;
        info!(task_id = %task.id, enabled, "task toggled");
        Ok(task)
    }

    fn try_begin(&self, task_id: &str) -> bool {
        self.running.lock().unwrap().insert(task_id.to_string())
    }

    fn finish(&self, task_id: &str) {
        self.running.lock().unwrap().remove(task_id);
    }

    /// Persist a skipped fire and consume its schedule slot.
    fn record_skip(&self, task: &ScheduledTask) -> Result<()> {
        let mut log = TaskExecutionLog::started(&task.id, &task.agent_id);
        log.status = ExecutionStatus::Skipped;
        log.completed_at = Some(log.started_at);
        log.duration_ms = Some(0);
        log.error = Some("previous execution still running".to_string());
        self.store.save_execution_log(&log)?;

        let mut task = task.clone();
        task.next_run_at = Some(cron::next_run_after(&task.cron_expr, Utc::now())?);
        self.store.save_task(&task)
    }

    /// Run one execution attempt and record its outcome.
    async fn execute_task(&self, task: &ScheduledTask) -> Result<TaskExecutionLog> {
        let mut log = TaskExecutionLog::started(&task.id, &task.agent_id);
        self.store.save_execution_log(&log)?;
        info!(task_id = %task.id, agent_id = %task.agent_id, name = %task.name, "task started");

        let timeout = Duration::from_secs(self.config.execution_timeout_secs.max(1));
        let outcome = match self.manager.get_agent(&task.agent_id) {
            None => Err(format!("agent {} is not available", task.agent_id)),
            Some(agent) => {
                let prompt = templates::render_prompt(task);
                match tokio::time::timeout(
                    timeout,
                    agent.process_message(SCHEDULER_CHANNEL, &prompt),
                )
                .await
                {
                    Ok(Ok(reply)) => Ok(reply),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "execution timed out after {}s",
                        timeout.as_secs()
                    )),
                }
            }
        };

        let completed = Utc::now();
        log.completed_at = Some(completed);
        log.duration_ms = Some((completed - log.started_at).num_milliseconds());
        match outcome {
            Ok(reply) => {
                log.status = ExecutionStatus::Success;
                log.result = Some(prefix_chars(&reply, RESULT_TRUNCATE_CHARS));
                info!(task_id = %task.id, "task succeeded");
            }
            Err(message) => {
                log.status = ExecutionStatus::Failed;
                log.error = Some(message.clone());
                warn!(task_id = %task.id, error = %message, "task failed");
            }
        }
        self.store.save_execution_log(&log)?;

        let mut task = task.clone();
        task.last_run_at = Some(log.started_at);
        match cron::next_run_after(&task.cron_expr, Utc::now()) {
            Ok(next) => task.next_run_at = Some(next),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "cannot compute next run, disabling task");
                task.enabled = false;
                task.next_run_at = None;
            }
        }
        task.updated_at = Utc::now();
        self.store.save_task(&task)?;

        Ok(log)
    }
}
