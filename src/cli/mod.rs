//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`. Commands
//! operate against the same platform wiring the server uses: one store,
//! one provider registry, one skill registry, one agent manager.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use roost::agent::{AgentDraft, AgentUpdate};
use roost::config::Config;
use roost::knowledge::KnowledgeManager;
use roost::manager::{AgentManager, ADMIN_USER};
use roost::providers::ProviderRegistry;
use roost::scheduler::{cron, TaskScheduler};
use roost::skills;
use roost::store::{PlatformStore, ScheduledTask, TaskType};

#[derive(Parser)]
#[command(name = "roost")]
#[command(version)]
#[command(about = "Multi-tenant platform for LLM-backed agents", long_about = None)]
struct Cli {
    /// Acting user id for access checks
    #[arg(long, global = true, default_value = ADMIN_USER)]
    user: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the platform: restore agents and start the task scheduler
    Serve,
    /// Manage agents
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
    /// Manage scheduled tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Manage agent knowledge
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// List agents visible to the acting user
    List,
    /// Create a new agent
    Create {
        /// Agent display name
        name: String,
        /// System prompt
        #[arg(long)]
        system_prompt: Option<String>,
        /// Model identifier (e.g. "gpt-4o-mini")
        #[arg(long)]
        model: Option<String>,
        /// Comma-separated skill ids to bind
        #[arg(long)]
        skills: Option<String>,
    },
    /// Send one message to an agent and print the reply
    Chat {
        /// Agent id
        id: String,
        /// Message text
        message: String,
    },
    /// Update an agent's name, prompt, model or skills
    Update {
        /// Agent id
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Comma-separated skill ids (replaces the current set)
        #[arg(long)]
        skills: Option<String>,
    },
    /// Stop a running agent
    Stop {
        /// Agent id
        id: String,
    },
    /// Delete an agent and its scheduled tasks
    Delete {
        /// Agent id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// List scheduled tasks
    List {
        /// Limit to one agent
        #[arg(long)]
        agent: Option<String>,
    },
    /// Create a scheduled task for an agent
    Create {
        /// Agent id
        agent: String,
        /// Task name
        name: String,
        /// Cron expression or phrase like "daily at 9am"
        schedule: String,
        /// Task type: social_post, lead_followup, content_gen, monitoring
        #[arg(long, default_value = "monitoring")]
        task_type: String,
        /// What the task should do
        #[arg(long)]
        description: Option<String>,
    },
    /// Show recent execution logs for a task
    Logs {
        /// Task id
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Execute a task immediately
    Run {
        /// Task id
        id: String,
    },
    /// Enable a task
    Enable {
        /// Task id
        id: String,
    },
    /// Disable a task
    Disable {
        /// Task id
        id: String,
    },
    /// Delete a task and its logs
    Delete {
        /// Task id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum KnowledgeAction {
    /// List an agent's knowledge items
    List {
        /// Agent id
        agent: String,
    },
    /// Ingest a file into an agent's knowledge
    Ingest {
        /// Agent id
        agent: String,
        /// Path to a text, markdown or PDF file
        path: std::path::PathBuf,
    },
    /// Copy knowledge items from one agent to another
    Share {
        /// Source agent id
        from: String,
        /// Target agent id
        to: String,
    },
    /// Delete one knowledge item
    Delete {
        /// Agent id
        agent: String,
        /// Item id
        id: String,
    },
}

/// Platform wiring shared by every command.
struct Platform {
    config: Arc<Config>,
    store: PlatformStore,
    manager: Arc<AgentManager>,
    scheduler: Arc<TaskScheduler>,
}

fn bootstrap() -> Result<Platform> {
    let config = Arc::new(Config::load().context("failed to load configuration")?);
    let store = PlatformStore::open(&config.database_path())?;
    let providers = Arc::new(ProviderRegistry::from_config(&config));
    let skill_registry = skills::build_registry(&config, store.clone());
    let knowledge = Arc::new(KnowledgeManager::new(store.clone(), Arc::clone(&providers)));
    let manager = AgentManager::new(
        Arc::clone(&config),
        store.clone(),
        skill_registry,
        providers,
        knowledge,
    );
    manager.load_persisted()?;

    let scheduler = TaskScheduler::new(store.clone(), Arc::clone(&manager), config.scheduler.clone());
    Ok(Platform {
        config,
        store,
        manager,
        scheduler,
    })
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    let logging_cfg = Config::load().map(|c| c.logging).unwrap_or_default();
    roost::utils::logging::init_logging(&logging_cfg)
        .context("failed to initialize logging")?;

    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => cmd_version(),
        Some(Commands::Serve) => cmd_serve(bootstrap()?).await?,
        Some(Commands::Agent { action }) => cmd_agent(&bootstrap()?, action, &cli.user).await?,
        Some(Commands::Task { action }) => cmd_task(&bootstrap()?, action, &cli.user).await?,
        Some(Commands::Knowledge { action }) => {
            cmd_knowledge(&bootstrap()?, action, &cli.user).await?
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("roost {}", env!("CARGO_PKG_VERSION"));
}

async fn cmd_serve(platform: Platform) -> Result<()> {
    println!(
        "roost serving: {} agent(s) live, database {}",
        platform.manager.agent_ids().len(),
        platform.config.database_path().display()
    );

    Arc::clone(&platform.scheduler).start();
    tokio::signal::ctrl_c().await?;
    println!("shutting down");
    platform.scheduler.stop();
    Ok(())
}

fn require_access(platform: &Platform, user: &str, agent_id: &str) -> Result<()> {
    if !platform.manager.can_access_agent(user, agent_id)? {
        anyhow::bail!("user '{}' has no access to agent {}", user, agent_id);
    }
    Ok(())
}

/// Resolve a task and check the caller against its agent's permissions.
fn require_task_access(platform: &Platform, user: &str, task_id: &str) -> Result<ScheduledTask> {
    let task = platform
        .store
        .get_task(task_id)?
        .ok_or_else(|| anyhow::anyhow!("task {} not found", task_id))?;
    require_access(platform, user, &task.agent_id)?;
    Ok(task)
}

/// Tasks the caller may see: one agent's tasks after an access check, or
/// every task whose agent the caller can access.
fn visible_tasks(
    platform: &Platform,
    user: &str,
    agent: Option<String>,
) -> Result<Vec<ScheduledTask>> {
    match agent {
        Some(agent_id) => {
            require_access(platform, user, &agent_id)?;
            Ok(platform.store.list_tasks_for_agent(&agent_id)?)
        }
        None => {
            let mut tasks = Vec::new();
            for task in platform.store.list_tasks()? {
                if platform.manager.can_access_agent(user, &task.agent_id)? {
                    tasks.push(task);
                }
            }
            Ok(tasks)
        }
    }
}

fn parse_skills(spec: Option<String>) -> Option<Vec<String>> {
    spec.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
}

async fn cmd_agent(platform: &Platform, action: AgentAction, user: &str) -> Result<()> {
    match action {
        AgentAction::List => {
            let agents = platform.manager.get_agents_for_user(user)?;
            if agents.is_empty() {
                println!("No agents visible to '{}'.", user);
                return Ok(());
            }
            for a in agents {
                println!(
                    "{}  {:<20} {:<12} model={} skills=[{}]",
                    a.id,
                    a.name,
                    a.status.as_str(),
                    a.model,
                    a.skills.join(",")
                );
            }
        }
        AgentAction::Create {
            name,
            system_prompt,
            model,
            skills,
        } => {
            let draft = AgentDraft {
                name,
                system_prompt,
                model,
                skills: parse_skills(skills).unwrap_or_default(),
                ..Default::default()
            };
            let (agent, report) = platform.manager.create_agent(draft, user)?;
            println!("created agent {}", agent.id());
            for (id, reason) in report.skipped {
                println!("  skill '{}' not bound: {}", id, reason);
            }
        }
        AgentAction::Chat { id, message } => {
            require_access(platform, user, &id)?;
            let agent = platform.manager.require_agent(&id)?;
            let reply = agent.process_message("cli", &message).await?;
            println!("{}", reply);
        }
        AgentAction::Update {
            id,
            name,
            system_prompt,
            model,
            skills,
        } => {
            require_access(platform, user, &id)?;
            let update = AgentUpdate {
                name,
                system_prompt,
                model,
                skills: parse_skills(skills),
                ..Default::default()
            };
            let (config, report) = platform.manager.update_agent(&id, update)?;
            println!("updated agent {}", config.id);
            for (skill_id, reason) in report.skipped {
                println!("  skill '{}' not bound: {}", skill_id, reason);
            }
        }
        AgentAction::Stop { id } => {
            require_access(platform, user, &id)?;
            platform.manager.stop_agent(&id)?;
            println!("stopped agent {}", id);
        }
        AgentAction::Delete { id } => {
            require_access(platform, user, &id)?;
            platform.manager.delete_agent(&id).await?;
            println!("deleted agent {}", id);
        }
    }
    Ok(())
}

async fn cmd_task(platform: &Platform, action: TaskAction, user: &str) -> Result<()> {
    match action {
        TaskAction::List { agent } => {
            let tasks = visible_tasks(platform, user, agent)?;
            if tasks.is_empty() {
                println!("No scheduled tasks.");
                return Ok(());
            }
            for t in tasks {
                println!(
                    "{}  {:<20} agent={} cron='{}' enabled={} next={}",
                    t.id,
                    t.name,
                    t.agent_id,
                    t.cron_expr,
                    t.enabled,
                    t.next_run_at
                        .map(|n| n.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        TaskAction::Create {
            agent,
            name,
            schedule,
            task_type,
            description,
        } => {
            require_access(platform, user, &agent)?;
            let cron_expr = cron::resolve_expression(&schedule)?;
            let mut task =
                ScheduledTask::new(&agent, &name, TaskType::parse(&task_type)?, &cron_expr);
            task.description = description.unwrap_or_default();
            task.next_run_at = Some(cron::next_run_after(&cron_expr, chrono::Utc::now())?);
            platform.store.save_task(&task)?;
            println!(
                "created task {} (next run {})",
                task.id,
                task.next_run_at.unwrap().to_rfc3339()
            );
        }
        TaskAction::Logs { id, limit } => {
            require_task_access(platform, user, &id)?;
            let logs = platform.store.list_execution_logs(&id, limit)?;
            if logs.is_empty() {
                println!("No executions recorded for task {}.", id);
                return Ok(());
            }
            for log in logs {
                let duration = log
                    .duration_ms
                    .map(|d| format!("{}ms", d))
                    .unwrap_or_else(|| "-".to_string());
                let detail = log
                    .error
                    .or(log.result)
                    .unwrap_or_default()
                    .replace('\n', " ");
                println!(
                    "{}  {:<8} {:>8}  {}",
                    log.started_at.to_rfc3339(),
                    log.status.as_str(),
                    duration,
                    detail
                );
            }
        }
        TaskAction::Run { id } => {
            require_task_access(platform, user, &id)?;
            let log = platform.scheduler.run_now(&id).await?;
            println!("task {} finished: {}", id, log.status.as_str());
            if let Some(result) = log.result {
                println!("{}", result);
            }
            if let Some(error) = log.error {
                println!("error: {}", error);
            }
        }
        TaskAction::Enable { id } => {
            require_task_access(platform, user, &id)?;
            let task = platform.scheduler.enable_task(&id)?;
            println!(
                "task {} enabled, next run {}",
                id,
                task.next_run_at.unwrap().to_rfc3339()
            );
        }
        TaskAction::Disable { id } => {
            require_task_access(platform, user, &id)?;
            platform.scheduler.disable_task(&id)?;
            println!("task {} disabled", id);
        }
        TaskAction::Delete { id } => {
            require_task_access(platform, user, &id)?;
            platform.store.delete_task(&id)?;
            println!("task {} deleted", id);
        }
    }
    Ok(())
}

async fn cmd_knowledge(platform: &Platform, action: KnowledgeAction, user: &str) -> Result<()> {
    match action {
        KnowledgeAction::List { agent } => {
            require_access(platform, user, &agent)?;
            let items = platform.manager.knowledge().list_items(&agent)?;
            if items.is_empty() {
                println!("No knowledge items for agent {}.", agent);
                return Ok(());
            }
            for item in items {
                println!(
                    "{}  {:<30} {:<10} {} tokens  {}",
                    item.id,
                    item.filename,
                    item.content_type,
                    item.token_count,
                    item.created_at.to_rfc3339()
                );
            }
        }
        KnowledgeAction::Ingest { agent, path } => {
            require_access(platform, user, &agent)?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let model = platform
                .manager
                .require_agent(&agent)
                .map(|a| a.config().model)
                .unwrap_or_else(|_| platform.config.agents.defaults.model.clone());

            let item = if filename.to_ascii_lowercase().ends_with(".pdf") {
                let bytes = std::fs::read(&path)?;
                platform
                    .manager
                    .knowledge()
                    .ingest_pdf(&agent, &filename, &bytes, &model)
                    .await?
            } else {
                let content = std::fs::read_to_string(&path)?;
                platform
                    .manager
                    .knowledge()
                    .ingest_file(&agent, &filename, &content, &model)
                    .await?
            };
            println!("ingested {} as {} ({} tokens)", filename, item.id, item.token_count);
        }
        KnowledgeAction::Share { from, to } => {
            require_access(platform, user, &from)?;
            require_access(platform, user, &to)?;
            let copied = platform.manager.knowledge().share(&from, &to, None)?;
            println!("copied {} item(s) from {} to {}", copied, from, to);
        }
        KnowledgeAction::Delete { agent, id } => {
            require_access(platform, user, &agent)?;
            platform.manager.knowledge().delete_item(&agent, &id)?;
            println!("deleted knowledge item {}", id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost::store::TaskType;

    fn test_platform(dir: &std::path::Path) -> Platform {
        let mut config = Config::default();
        config.agents.defaults.memory_backend = "buffer".to_string();
        config.storage.memory_dir = dir.join("memory").to_string_lossy().to_string();
        config.storage.agents_dir = dir.join("agents").to_string_lossy().to_string();
        let config = Arc::new(config);

        let store = PlatformStore::open_in_memory().unwrap();
        let providers = Arc::new(ProviderRegistry::new());
        let skill_registry = skills::build_registry(&config, store.clone());
        let knowledge = Arc::new(KnowledgeManager::new(store.clone(), Arc::clone(&providers)));
        let manager = AgentManager::new(
            Arc::clone(&config),
            store.clone(),
            skill_registry,
            providers,
            knowledge,
        );
        let scheduler =
            TaskScheduler::new(store.clone(), Arc::clone(&manager), config.scheduler.clone());
        Platform {
            config,
            store,
            manager,
            scheduler,
        }
    }

    fn owned_task(platform: &Platform, owner: &str, name: &str) -> ScheduledTask {
        let draft = AgentDraft {
            name: format!("{}-agent", name),
            ..Default::default()
        };
        let (agent, _) = platform.manager.create_agent(draft, owner).unwrap();
        let task = ScheduledTask::new(&agent.id(), name, TaskType::Monitoring, "0 9 * * *");
        platform.store.save_task(&task).unwrap();
        task
    }

    #[tokio::test]
    async fn test_task_mutations_check_agent_access() {
        let dir = tempfile::tempdir().unwrap();
        let platform = test_platform(dir.path());
        let task = owned_task(&platform, "alice", "nightly");

        for action in [
            TaskAction::Delete {
                id: task.id.clone(),
            },
            TaskAction::Disable {
                id: task.id.clone(),
            },
            TaskAction::Enable {
                id: task.id.clone(),
            },
            TaskAction::Logs {
                id: task.id.clone(),
                limit: 5,
            },
            TaskAction::Run {
                id: task.id.clone(),
            },
        ] {
            let err = cmd_task(&platform, action, "mallory").await.unwrap_err();
            assert!(err.to_string().contains("no access"));
        }
        assert!(platform.store.get_task(&task.id).unwrap().is_some());

        // The owner still can
        cmd_task(
            &platform,
            TaskAction::Delete {
                id: task.id.clone(),
            },
            "alice",
        )
        .await
        .unwrap();
        assert!(platform.store.get_task(&task.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_task_list_scoped_to_accessible_agents() {
        let dir = tempfile::tempdir().unwrap();
        let platform = test_platform(dir.path());
        let alices = owned_task(&platform, "alice", "hers");
        let bobs = owned_task(&platform, "bob", "his");

        let visible = visible_tasks(&platform, "alice", None).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, alices.id);

        // Admin sees every tenant's tasks
        let all = visible_tasks(&platform, ADMIN_USER, None).unwrap();
        assert_eq!(all.len(), 2);

        // Asking for another tenant's agent directly is rejected
        assert!(visible_tasks(&platform, "alice", Some(bobs.agent_id.clone())).is_err());
    }

    #[tokio::test]
    async fn test_task_create_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let platform = test_platform(dir.path());
        let draft = AgentDraft {
            name: "typed".to_string(),
            ..Default::default()
        };
        let (agent, _) = platform.manager.create_agent(draft, "alice").unwrap();

        let err = cmd_task(
            &platform,
            TaskAction::Create {
                agent: agent.id(),
                name: "bad".to_string(),
                schedule: "0 9 * * *".to_string(),
                task_type: "definitely-not-registered".to_string(),
                description: None,
            },
            "alice",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unknown task type"));
        assert!(platform
            .store
            .list_tasks_for_agent(&agent.id())
            .unwrap()
            .is_empty());
    }
}
