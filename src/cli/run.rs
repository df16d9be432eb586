//! Command execution for the CLI.
//!
//! This module handles running CLI commands and producing output.

use crate::cli::{Cli, Command, ReminderCommand, SchedulerCommand, TaskCommand};
use crate::config::EngineConfig;
use crate::dispatch::LogDispatcher;
use crate::models::{NewReminder, NewTask, Reminder, ReminderKind, Task, TaskStatus};
use crate::reminders::{parse_instant, DueReminderScheduler, NotifyReason, SchedulerSettings};
use crate::store::{SqliteStore, TaskFilter};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> CliOutput {
    let Cli { dir, command } = cli;
    match command {
        Command::Version => run_version(),
        Command::Init => run_init(&dir),
        Command::Scheduler(cmd) => match open_env(&dir) {
            Ok((config, store)) => run_scheduler_cmd(&config, store, cmd).await,
            Err(e) => error_output(e),
        },
        Command::Task(cmd) => match open_env(&dir) {
            Ok((_, store)) => run_task_cmd(&store, cmd),
            Err(e) => error_output(e),
        },
        Command::Reminder(cmd) => match open_env(&dir) {
            Ok((_, store)) => run_reminder_cmd(&store, cmd),
            Err(e) => error_output(e),
        },
    }
}

// === Utility Commands ===

fn run_version() -> CliOutput {
    CliOutput {
        exit_code: ExitCode::SUCCESS,
        stdout: vec![],
        stderr: vec![format!("cadence v{}", crate::VERSION)],
    }
}

fn run_init(dir: &Path) -> CliOutput {
    let (config, created) = match EngineConfig::load_from(dir) {
        Ok(Some(config)) => (config, false),
        Ok(None) => {
            let config = EngineConfig::default();
            if let Err(e) = config.save_to(dir) {
                return error_output(format!("Error writing config: {e}"));
            }
            (config, true)
        }
        Err(e) => return error_output(format!("Error reading config: {e}")),
    };

    let db_path = config.database_path_in(dir);
    if let Err(e) = SqliteStore::new(&db_path) {
        return error_output(format!("Error creating database: {e}"));
    }

    let mut messages = vec![if created {
        format!("Config written to {}", EngineConfig::config_path(dir).display())
    } else {
        format!("Config already present at {}", EngineConfig::config_path(dir).display())
    }];
    messages.push(format!("  database: {}", db_path.display()));
    messages.push(format!("  scheduler interval: {}s", config.scheduler.interval_secs));
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![], stderr: messages }
}

// === Scheduler Commands ===

async fn run_scheduler_cmd(config: &EngineConfig, store: SqliteStore, cmd: SchedulerCommand) -> CliOutput {
    let renderer = match config.notifications.renderer() {
        Ok(r) => r,
        Err(e) => return error_output(format!("Invalid notification template: {e}")),
    };
    let scheduler = DueReminderScheduler::new(
        store,
        Arc::new(LogDispatcher::new()),
        SchedulerSettings::from(&config.scheduler),
    )
    .with_renderer(renderer);

    match cmd {
        SchedulerCommand::Run => scheduler_run(scheduler).await,
        SchedulerCommand::Tick => match scheduler.run_once().await {
            Ok(report) => json_output(&report),
            Err(e) => error_output(e.to_string()),
        },
        SchedulerCommand::Due => match scheduler.due_reminders() {
            Ok(due) => {
                let output: Vec<DueOutput> =
                    due.into_iter().map(|(reminder, reason)| DueOutput { reason, reminder }).collect();
                json_output(&output)
            }
            Err(e) => error_output(e.to_string()),
        },
    }
}

async fn scheduler_run(scheduler: DueReminderScheduler) -> CliOutput {
    let shutdown = Arc::new(Notify::new());
    let handle = scheduler.spawn(Arc::clone(&shutdown));

    let interrupted = tokio::signal::ctrl_c().await;
    shutdown.notify_one();
    if let Err(e) = handle.await {
        return error_output(format!("Scheduler task failed: {e}"));
    }
    match interrupted {
        Ok(()) => {
            info!("interrupted; scheduler shut down");
            success_output("Scheduler stopped".to_string())
        }
        Err(e) => error_output(format!("Could not listen for Ctrl-C: {e}")),
    }
}

// === Task Commands ===

fn run_task_cmd(store: &SqliteStore, cmd: TaskCommand) -> CliOutput {
    match cmd {
        TaskCommand::Create { owner, title, description, project } => {
            let new = NewTask { title, description, project_id: project, due_at: None };
            to_output(store.create_task(owner, &new))
        }
        TaskCommand::Get { owner, id } => to_output(store.get_task(owner, id)),
        TaskCommand::List { owner, status } => {
            let status = match status.as_deref().map(TaskStatus::from_str).transpose() {
                Ok(s) => s,
                Err(e) => return error_output(e.to_string()),
            };
            to_output(store.list_tasks(owner, &TaskFilter { status, project_id: None }))
        }
        TaskCommand::Ready { owner } => to_output(store.ready_tasks(owner)),
        TaskCommand::Complete { owner, id } => to_output(store.complete_task(owner, id)),
        TaskCommand::Status { owner, id, status } => match TaskStatus::from_str(&status) {
            Ok(status) => to_output(store.set_task_status(owner, id, status)),
            Err(e) => error_output(e.to_string()),
        },
        TaskCommand::AddDep { owner, id, depends_on } => {
            to_output(store.add_dependency::<Task>(owner, id, depends_on))
        }
        TaskCommand::RemoveDep { owner, id, depends_on } => {
            to_output(store.remove_dependency::<Task>(owner, id, depends_on))
        }
    }
}

// === Reminder Commands ===

fn run_reminder_cmd(store: &SqliteStore, cmd: ReminderCommand) -> CliOutput {
    match cmd {
        ReminderCommand::Create { owner, description, title, at, rule, after_task, delay, every, task } => {
            let trigger_at = match at.as_deref().map(parse_instant).transpose() {
                Ok(t) => t,
                Err(e) => return error_output(e.to_string()),
            };
            let kind = if after_task.is_some() || delay.is_some() {
                ReminderKind::RecurringRelative
            } else if rule.is_some() {
                ReminderKind::RecurringScheduled
            } else {
                ReminderKind::OneTime
            };
            let spec = NewReminder {
                title,
                description,
                kind,
                trigger_at,
                recurrence_rule: rule,
                remind_frequency_minutes: every,
                relative_to_task_id: after_task,
                relative_delay_minutes: delay,
                task_id: task,
                ..NewReminder::default()
            };
            to_output(store.create_reminder(owner, &spec))
        }
        ReminderCommand::Due { owner, all } => to_output(store.list_reminders(owner, !all)),
        ReminderCommand::Complete { owner, id } => to_output(store.complete_reminder(owner, id)),
        ReminderCommand::Skip { owner, id } => to_output(store.skip_reminder(owner, id)),
        ReminderCommand::Snooze { owner, id, until } => {
            let until = match until.as_deref().map(parse_instant).transpose() {
                Ok(u) => u,
                Err(e) => return error_output(e.to_string()),
            };
            to_output(store.snooze_reminder(owner, id, until))
        }
        ReminderCommand::History { owner, id } => to_output(store.reminder_history(owner, id, None, None)),
        ReminderCommand::Delete { owner, id } => match store.delete_reminder(owner, id) {
            Ok(()) => success_output(format!("Deleted reminder {id}")),
            Err(e) => error_output(e.to_string()),
        },
    }
}

// === Helper Functions ===

fn open_env(dir: &Path) -> Result<(EngineConfig, SqliteStore), String> {
    let config = EngineConfig::load_or_default(dir).map_err(|e| format!("Error loading config: {e}"))?;
    let store = SqliteStore::new(config.database_path_in(dir)).map_err(|e| e.to_string())?;
    Ok((config, store))
}

fn to_output<T: Serialize>(result: crate::Result<T>) -> CliOutput {
    match result {
        Ok(value) => json_output(&value),
        Err(e) => error_output(e.to_string()),
    }
}

fn json_output<T: Serialize>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(e.to_string()),
    }
}

fn success_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![message], stderr: vec![] }
}

fn error_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![message] }
}

// === Output Types ===

#[derive(Serialize)]
struct DueOutput {
    reason: NotifyReason,
    reminder: Reminder,
}
