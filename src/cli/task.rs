//! Task CLI subcommands.
//!
//! Every command takes the acting owner id first. Tasks of other owners are
//! reported as not found.

use clap::Subcommand;

/// Task commands.
///
/// ## Quick Start
///
/// ```bash
/// # Create two tasks and make the second wait on the first
/// cadence task create 1 "Buy paint"
/// cadence task create 1 "Paint fence"
/// cadence task add-dep 1 2 1
///
/// # Completing the first releases the second
/// cadence task complete 1 1
/// ```
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Create a task.
    Create {
        /// Owner id
        owner: i64,

        /// Title for the task
        title: String,

        /// Description with more details
        #[arg(short, long, default_value = "")]
        description: String,

        /// Project the task belongs to
        #[arg(short, long)]
        project: Option<i64>,
    },

    /// Get a task by id.
    Get {
        /// Owner id
        owner: i64,
        /// Task id
        id: i64,
    },

    /// List tasks, optionally filtered by status.
    List {
        /// Owner id
        owner: i64,

        /// Filter by status (pending, in_progress, completed, blocked, cancelled)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// List tasks that can be worked on now.
    Ready {
        /// Owner id
        owner: i64,
    },

    /// Mark a task completed and print what it released.
    Complete {
        /// Owner id
        owner: i64,
        /// Task id
        id: i64,
    },

    /// Set a task's status.
    Status {
        /// Owner id
        owner: i64,
        /// Task id
        id: i64,
        /// New status
        status: String,
    },

    /// Make a task depend on another.
    #[command(name = "add-dep")]
    AddDep {
        /// Owner id
        owner: i64,
        /// Task that will wait
        id: i64,
        /// Task it waits on
        depends_on: i64,
    },

    /// Remove a dependency.
    #[command(name = "remove-dep")]
    RemoveDep {
        /// Owner id
        owner: i64,
        /// Task that waits
        id: i64,
        /// Task it waits on
        depends_on: i64,
    },
}
