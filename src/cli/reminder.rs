//! Reminder CLI subcommands.

use clap::Subcommand;

/// Reminder commands.
///
/// Instants are RFC 3339 with an explicit offset, e.g. `2025-01-06T09:00:00Z`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ReminderCommand {
    /// Create a reminder.
    ///
    /// The kind follows from the options: `--at` alone is one-time, `--at`
    /// with `--rule` is scheduled, `--after-task` with `--delay` is relative.
    Create {
        /// Owner id
        owner: i64,

        /// Body text
        description: String,

        /// Short title
        #[arg(short, long)]
        title: Option<String>,

        /// First due instant
        #[arg(long)]
        at: Option<String>,

        /// Recurrence rule, e.g. "FREQ=WEEKLY;BYDAY=MO"
        #[arg(long)]
        rule: Option<String>,

        /// Fire relative to this task's completion
        #[arg(long)]
        after_task: Option<i64>,

        /// Minutes after the task completes
        #[arg(long)]
        delay: Option<i64>,

        /// Re-notify every N minutes until resolved
        #[arg(long)]
        every: Option<i64>,

        /// Link the reminder to a task
        #[arg(long)]
        task: Option<i64>,
    },

    /// List the owner's active reminders.
    Due {
        /// Owner id
        owner: i64,

        /// Include resolved reminders
        #[arg(long)]
        all: bool,
    },

    /// Complete the current occurrence.
    Complete {
        /// Owner id
        owner: i64,
        /// Reminder id
        id: i64,
    },

    /// Skip the current occurrence.
    Skip {
        /// Owner id
        owner: i64,
        /// Reminder id
        id: i64,
    },

    /// Snooze until an instant, or clear the snooze when `--until` is omitted.
    Snooze {
        /// Owner id
        owner: i64,
        /// Reminder id
        id: i64,
        /// End of the snooze
        #[arg(long)]
        until: Option<String>,
    },

    /// Show a reminder's trigger/complete/skip history, newest first.
    History {
        /// Owner id
        owner: i64,
        /// Reminder id
        id: i64,
    },

    /// Delete a reminder and its history.
    Delete {
        /// Owner id
        owner: i64,
        /// Reminder id
        id: i64,
    },
}
