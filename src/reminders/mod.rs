//! Reminders: lifecycle operations, notification rendering and the due scheduler.

pub mod lifecycle;
pub mod render;
pub mod scheduler;

pub use lifecycle::{parse_instant, validate_reminder};
pub use render::MessageRenderer;
pub use scheduler::{DueReminderScheduler, NotifyReason, RunReport, SchedulerSettings};
