//! Notification message rendering using Tera.

use super::scheduler::NotifyReason;
use crate::error::Result;
use crate::models::Reminder;
use crate::traits::Notification;
use tera::{Context, Tera};
use tracing::warn;

/// Built-in body template: the description, else the title.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/notification_body.tera");

/// Body used when the template renders nothing or fails.
pub const DEFAULT_FALLBACK_BODY: &str = "Your reminder is due!";

const BODY_TEMPLATE: &str = "notification_body";

/// Turns a due reminder into a [`Notification`].
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    tera: Tera,
    fallback: String,
}

impl MessageRenderer {
    /// Create a renderer from a body template and a fallback body.
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not parse.
    pub fn new(template: &str, fallback: impl Into<String>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(BODY_TEMPLATE, template)?;
        Ok(Self { tera, fallback: fallback.into() })
    }

    /// The built-in template with the default fallback.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(DEFAULT_TEMPLATE, DEFAULT_FALLBACK_BODY).unwrap_or_else(|e| {
            warn!(error = %e, "built-in notification template failed to parse");
            Self { tera: Tera::default(), fallback: DEFAULT_FALLBACK_BODY.to_string() }
        })
    }

    /// Render the body text for a reminder.
    #[must_use]
    pub fn body(&self, reminder: &Reminder, reason: NotifyReason) -> String {
        let mut context = Context::new();
        context.insert("title", &reminder.title);
        context.insert("description", &reminder.description);
        context.insert("reminder_id", &reminder.id);
        context.insert("kind", reminder.kind.as_str());
        context.insert("trigger_at", &reminder.trigger_at.map(|t| t.to_rfc3339()));
        context.insert("reason", reason.as_str());

        match self.tera.render(BODY_TEMPLATE, &context) {
            Ok(rendered) if !rendered.trim().is_empty() => rendered.trim().to_string(),
            Ok(_) => self.fallback.clone(),
            Err(e) => {
                warn!(reminder_id = reminder.id, error = %e, "notification template failed; using fallback");
                self.fallback.clone()
            }
        }
    }

    /// Build the notification for a reminder.
    #[must_use]
    pub fn render(&self, reminder: &Reminder, reason: NotifyReason) -> Notification {
        Notification {
            owner_id: reminder.owner_id,
            reminder_id: reminder.id,
            title: reminder.title.clone(),
            body: self.body(reminder, reason),
            metadata: serde_json::json!({
                "reminder_id": reminder.id,
                "kind": reminder.kind.as_str(),
                "reason": reason.as_str(),
                "trigger_at": reminder.trigger_at.map(|t| t.to_rfc3339()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderKind;
    use chrono::{TimeZone, Utc};

    fn reminder(title: Option<&str>, description: &str) -> Reminder {
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        Reminder {
            id: 42,
            owner_id: 7,
            title: title.map(str::to_string),
            description: description.to_string(),
            kind: ReminderKind::OneTime,
            trigger_at: Some(at),
            recurrence_rule: None,
            remind_frequency_minutes: None,
            relative_to_task_id: None,
            relative_delay_minutes: None,
            last_notified_at: None,
            is_active: true,
            snoozed_until: None,
            task_id: None,
            file_reference_id: None,
            contact_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_description_wins_over_title() {
        let renderer = MessageRenderer::standard();
        let body = renderer.body(&reminder(Some("Title"), "Take the bins out"), NotifyReason::FirstTrigger);
        assert_eq!(body, "Take the bins out");
    }

    #[test]
    fn test_title_then_fallback() {
        let renderer = MessageRenderer::standard();
        assert_eq!(renderer.body(&reminder(Some("Bins"), ""), NotifyReason::FirstTrigger), "Bins");
        assert_eq!(renderer.body(&reminder(None, ""), NotifyReason::FirstTrigger), DEFAULT_FALLBACK_BODY);
    }

    #[test]
    fn test_text_is_not_html_escaped() {
        let renderer = MessageRenderer::standard();
        let body = renderer.body(&reminder(None, "Milk & eggs"), NotifyReason::FirstTrigger);
        assert_eq!(body, "Milk & eggs");
    }

    #[test]
    fn test_custom_template_sees_reason() {
        let renderer = MessageRenderer::new("{{ reason }}: {{ description }}", "x").unwrap();
        let body = renderer.body(&reminder(None, "Stand up"), NotifyReason::Persistent);
        assert_eq!(body, "persistent: Stand up");
    }

    #[test]
    fn test_render_failure_uses_fallback() {
        let renderer = MessageRenderer::new("{{ missing_variable }}", "Reminder!").unwrap();
        assert_eq!(renderer.body(&reminder(None, "x"), NotifyReason::FirstTrigger), "Reminder!");
    }

    #[test]
    fn test_bad_template_is_rejected() {
        assert!(MessageRenderer::new("{% if %}", "x").is_err());
    }

    #[test]
    fn test_notification_metadata_carries_reminder_id() {
        let renderer = MessageRenderer::standard();
        let notification = renderer.render(&reminder(Some("T"), "D"), NotifyReason::FirstTrigger);
        assert_eq!(notification.owner_id, 7);
        assert_eq!(notification.metadata["reminder_id"], 42);
        assert_eq!(notification.metadata["reason"], "first_trigger");
    }
}
