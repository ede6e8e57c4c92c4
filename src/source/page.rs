use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single record from the feed. Only its timestamp field is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(pub Value);

impl LogEntry {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Compact JSON encoding (no whitespace), used as the sink message
    pub fn to_compact_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

impl From<Value> for LogEntry {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One page of the feed, newest entry first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entries: Vec<LogEntry>,
    /// Cursor for the next (older) page; `None` when the feed is exhausted
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(entries: Vec<LogEntry>, next_cursor: Option<String>) -> Self {
        Self {
            entries,
            next_cursor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
