use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Header keys every row carries. A payload cannot replace them.
const HEADER_KEYS: [&str; 3] = ["type", "session_id", "ts"];

/// One row of a session's `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl SessionEvent {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Append-only log of everything a studio session does: prompts, images,
/// chat status changes, notices, and mint attempts.
///
/// The file is opened on first write and stays open for the session.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventLog>,
}

#[derive(Debug)]
struct EventLog {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLog {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, kind: &str, mut payload: EventPayload) -> anyhow::Result<SessionEvent> {
        for key in HEADER_KEYS {
            if payload.remove(key).is_some() {
                tracing::debug!(kind, key, "dropped header key from event payload");
            }
        }
        let event = SessionEvent {
            kind: kind.to_string(),
            session_id: self.inner.session_id.clone(),
            ts: now_utc_iso(),
            payload,
        };
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut guard = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(line.as_bytes())
                .with_context(|| format!("failed to append to {}", self.inner.path.display()))?;
        }
        Ok(event)
    }

    /// Like [`EventWriter::emit`], but a failed write only produces a warning.
    pub fn emit_quiet(&self, kind: &str, payload: EventPayload) {
        if let Err(err) = self.emit(kind, payload) {
            tracing::warn!(kind, error = %err, "failed to append event");
        }
    }

    /// Rows in file order. A missing file reads as empty; unparseable lines are skipped.
    pub fn read_events(&self) -> anyhow::Result<Vec<SessionEvent>> {
        let content = match std::fs::read_to_string(&self.inner.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.inner.path.display()))
            }
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn read_types(&self) -> Vec<String> {
        self.read_events()
            .unwrap_or_default()
            .into_iter()
            .map(|event| event.kind)
            .collect()
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed to open {}", self.inner.path.display()))
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> EventPayload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let emitted = writer.emit("prompt_submitted", payload(json!({"prompt": "a red circle"})))?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        assert!(!line.contains(": "));
        let parsed: Value = serde_json::from_str(line)?;
        assert_eq!(parsed["type"], "prompt_submitted");
        assert_eq!(parsed["session_id"], "session-123");
        assert_eq!(parsed["prompt"], "a red circle");
        assert_eq!(parsed["ts"].as_str(), Some(emitted.ts.as_str()));
        DateTime::parse_from_rfc3339(&emitted.ts)?;
        Ok(())
    }

    #[test]
    fn payload_cannot_replace_event_header() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-123");

        let emitted = writer.emit(
            "mint_confirmed",
            payload(json!({"type": "forged", "session_id": "other", "hash": "0xabc"})),
        )?;

        assert_eq!(emitted.kind, "mint_confirmed");
        assert_eq!(emitted.session_id, "session-123");
        assert_eq!(emitted.field("hash"), Some(&json!("0xabc")));
        assert_eq!(writer.read_events()?, vec![emitted]);
        Ok(())
    }

    #[test]
    fn read_types_preserves_append_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("nested/events.jsonl"), "s");
        assert!(writer.read_types().is_empty());

        writer.emit("one", EventPayload::new())?;
        writer.emit_quiet("two", EventPayload::new());

        assert_eq!(writer.read_types(), vec!["one", "two"]);
        Ok(())
    }

    #[test]
    fn clones_share_one_log_and_skip_garbage_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "s");
        let other = writer.clone();

        writer.emit("chat_status", payload(json!({"status": "submitted"})))?;
        fs::OpenOptions::new().append(true).open(&path)?.write_all(b"not json\n")?;
        other.emit("chat_status", payload(json!({"status": "idle"})))?;

        let statuses: Vec<Value> = writer
            .read_events()?
            .iter()
            .filter_map(|event| event.field("status").cloned())
            .collect();
        assert_eq!(statuses, vec![json!("submitted"), json!("idle")]);
        Ok(())
    }
}
