use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::now_utc_iso;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub total_messages: u64,
    pub total_images: u64,
    pub minted: Vec<Map<String, Value>>,
}

pub fn write_summary(
    path: &Path,
    summary: &SessionSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{write_summary, SessionSummary};

    #[test]
    fn write_summary_generates_expected_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("summary.json");

        let mut mint = Map::new();
        mint.insert("hash".to_string(), json!("0xabc"));
        mint.insert("name".to_string(), json!("Red Circle"));
        let summary = SessionSummary {
            session_id: "session-123".to_string(),
            started_at: "2026-10-16T00:00:00+00:00".to_string(),
            finished_at: "2026-10-16T00:10:00+00:00".to_string(),
            total_messages: 4,
            total_images: 1,
            minted: vec![mint],
        };
        let mut extra = Map::new();
        extra.insert("wallet".to_string(), Value::String("0x1".to_string()));
        write_summary(&path, &summary, Some(&extra))?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["session_id"], json!("session-123"));
        assert_eq!(parsed["total_messages"], json!(4));
        assert_eq!(parsed["minted"][0]["hash"], json!("0xabc"));
        assert_eq!(parsed["wallet"], json!("0x1"));
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());
        Ok(())
    }
}
