//! Hierarchical CLI for cadence.
//!
//! This module provides the command-line interface with two-level commands
//! for running the scheduler and acting on tasks and reminders.

mod reminder;
mod run;
mod scheduler;
mod task;


pub use reminder::ReminderCommand;
pub use run::{run, CliOutput};
pub use scheduler::SchedulerCommand;
pub use task::TaskCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cadence - dependency-aware tasks and reminder scheduling.
///
/// For detailed help on any command group, use:
///   cadence <command> --help
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base directory holding `.cadence/`
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the default config (if missing) and create the database.
    Init,

    /// Show version information.
    Version,

    /// Due-reminder scheduler.
    ///
    /// `run` loops on the configured interval until interrupted; `tick` runs
    /// a single pass and prints what it did.
    #[command(subcommand)]
    Scheduler(SchedulerCommand),

    /// Task status and dependencies.
    ///
    /// Completing a task releases the tasks waiting on it and arms the
    /// reminders scheduled relative to its completion.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Reminder actions.
    #[command(subcommand)]
    Reminder(ReminderCommand),
}
