//! Scheduler CLI subcommands.

use clap::Subcommand;

/// Scheduler commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run the scheduler until Ctrl-C.
    ///
    /// Notifications are written to the log.
    Run,

    /// Run one scheduler pass and print the report as JSON.
    Tick,

    /// Show which reminders the next pass would notify, without notifying.
    Due,
}
