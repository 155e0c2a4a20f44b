use std::sync::{Arc, Mutex};

use reshape_contracts::events::{EventPayload, EventWriter};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: None,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Collects notices in memory until a frontend drains them.
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

/// Ambient services handed to every component explicitly.
#[derive(Clone)]
pub struct StudioContext {
    pub events: EventWriter,
    pub notifier: Arc<dyn Notifier>,
}

impl StudioContext {
    pub fn new(events: EventWriter, notifier: Arc<dyn Notifier>) -> Self {
        Self { events, notifier }
    }

    /// Shows the notice and records it in the event log.
    pub fn notify(&self, notice: Notice) {
        self.events.emit_quiet(
            "notice",
            map_object(json!({
                "level": notice.level.as_str(),
                "title": notice.title,
                "description": notice.description,
            })),
        );
        self.notifier.notify(notice);
    }

    pub fn emit(&self, event_type: &str, payload: Value) {
        self.events.emit_quiet(event_type, map_object(payload));
    }
}

pub(crate) fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_logs_event_and_forwards_notice() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = Arc::new(NoticeLog::new());
        let ctx = StudioContext::new(
            EventWriter::new(temp.path().join("events.jsonl"), "s"),
            log.clone(),
        );

        ctx.notify(Notice::error("Minting failed").with_description("user rejected"));

        let notices = log.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].description.as_deref(), Some("user rejected"));
        assert!(log.drain().is_empty());
        assert_eq!(ctx.events.read_types(), vec!["notice"]);
        Ok(())
    }
}
