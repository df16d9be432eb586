//! # `cadence`
//!
//! Dependency-aware status propagation for tasks and projects, and a
//! scheduler for one-time, recurring and completion-relative reminders.

pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod logging;
pub mod models;
pub mod recurrence;
pub mod reminders;
pub mod store;
pub mod testing;
pub mod traits;

#[cfg(feature = "cli")]
pub mod cli;

pub use completion::StatusChange;
pub use error::{Error, Result, ValidationError};
pub use store::SqliteStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
