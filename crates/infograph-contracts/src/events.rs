use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

pub const GENERATION_STARTED: &str = "generation_started";
pub const GENERATION_SUCCEEDED: &str = "generation_succeeded";
pub const GENERATION_FAILED: &str = "generation_failed";
pub const REAUTH_REQUESTED: &str = "reauth_requested";

/// Append-only JSON-lines log of studio activity.
///
/// Each line is one compact object with `type`, `session_id` and `ts`; the
/// caller payload is merged last and may override those defaults.
#[derive(Debug, Clone)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    lock: Arc<Mutex<()>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;

        Ok(Value::Object(event))
    }
}

/// Read back every event in a log, skipping lines that do not parse.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    Ok(raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .collect())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{read_events, EventPayload, EventWriter, GENERATION_STARTED};

    #[test]
    fn emit_writes_one_compact_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("style_id".to_string(), json!("noir"));
        let emitted = writer.emit(GENERATION_STARTED, payload)?;
        writer.emit("second", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 2);
        let first: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(first, emitted);
        assert_eq!(first["type"], json!("generation_started"));
        assert_eq!(first["session_id"], json!("session-1"));
        assert_eq!(first["style_id"], json!("noir"));
        DateTime::parse_from_rfc3339(first["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_overrides_defaults_and_bad_lines_are_skipped() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), json!("override"));
        writer.emit("one", payload)?;
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| std::io::Write::write_all(&mut file, b"{broken\n"))?;
        writer.emit("two", EventPayload::new())?;

        let events = read_events(&path)?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["session_id"], json!("override"));
        assert_eq!(events[1]["type"], json!("two"));
        Ok(())
    }
}
