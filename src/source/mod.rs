//! Conversation source interfaces.
//!
//! Ownership model:
//! - `ChatRecordSource` / `WideRecordSource` are the flattener-facing
//!   capability interfaces, one per source shape.
//! - Hub-backed implementations live in `huggingface`; in-memory sources
//!   back the tests and small fixture runs.
//!
//! Row parsing is lenient by design: missing optional fields default,
//! malformed timestamps fall back, and only a structurally broken row (not
//! an object at all) is surfaced as an error by the hub layer.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::constants::flatten::WIDE_MAX_EXCHANGES;
use crate::errors::PrepError;
use crate::types::SourceId;

/// Hub snapshot-backed sources.
#[cfg(feature = "huggingface")]
pub mod huggingface;
#[cfg(feature = "huggingface")]
pub use huggingface::{HubTableConfig, HuggingFaceChatSource, HuggingFaceWideSource};

/// Role-tagged message within a message-list conversation record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Speaker role, `user` or `assistant` (others are ignored downstream).
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Message-list conversation record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatRecord {
    /// Stable conversation identifier, when the row carries one.
    pub conversation_hash: Option<String>,
    /// Hashed user identifier, when the row carries one.
    pub hashed_ip: Option<String>,
    /// Model label, when the row carries one.
    pub model: Option<String>,
    /// Conversation base timestamp, when present and parseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Ordered role-tagged messages.
    pub messages: Vec<ChatMessage>,
}

/// Wide-column conversation record: up to four positional prompt/response pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WideRecord {
    /// `P1..P4` values; `None` when the field is absent.
    pub prompts: [Option<String>; WIDE_MAX_EXCHANGES],
    /// `R1..R4` values; `None` when the field is absent.
    pub responses: [Option<String>; WIDE_MAX_EXCHANGES],
}

/// Index-addressable source of message-list records.
pub trait ChatRecordSource: Send + Sync {
    /// Stable source identifier used in errors and progress events.
    fn id(&self) -> &str;
    /// Current index domain size, typically `Some(total_records)`.
    fn len_hint(&self) -> Option<usize>;
    /// Return the record at `idx`, or `None` for sparse/missing positions.
    fn record_at(&self, idx: usize) -> Result<Option<ChatRecord>, PrepError>;
}

/// Index-addressable source of wide-column records.
pub trait WideRecordSource: Send + Sync {
    /// Stable source identifier used in errors and progress events.
    fn id(&self) -> &str;
    /// Current index domain size, typically `Some(total_records)`.
    fn len_hint(&self) -> Option<usize>;
    /// Return the record at `idx`, or `None` for sparse/missing positions.
    fn record_at(&self, idx: usize) -> Result<Option<WideRecord>, PrepError>;
}

/// In-memory message-list source for tests and small datasets.
pub struct InMemoryChatSource {
    id: SourceId,
    records: Vec<ChatRecord>,
}

impl InMemoryChatSource {
    /// Create an in-memory source from prebuilt records.
    pub fn new(id: impl Into<SourceId>, records: Vec<ChatRecord>) -> Self {
        Self {
            id: id.into(),
            records,
        }
    }
}

impl ChatRecordSource for InMemoryChatSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.records.len())
    }

    fn record_at(&self, idx: usize) -> Result<Option<ChatRecord>, PrepError> {
        Ok(self.records.get(idx).cloned())
    }
}

/// In-memory wide-column source for tests and small datasets.
pub struct InMemoryWideSource {
    id: SourceId,
    records: Vec<WideRecord>,
}

impl InMemoryWideSource {
    /// Create an in-memory source from prebuilt records.
    pub fn new(id: impl Into<SourceId>, records: Vec<WideRecord>) -> Self {
        Self {
            id: id.into(),
            records,
        }
    }
}

impl WideRecordSource for InMemoryWideSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.records.len())
    }

    fn record_at(&self, idx: usize) -> Result<Option<WideRecord>, PrepError> {
        Ok(self.records.get(idx).cloned())
    }
}

impl ChatRecord {
    /// Build a record from a decoded hub row object, leniently.
    pub fn from_row(row: &Map<String, Value>) -> Self {
        let messages = row
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let obj = item.as_object()?;
                        Some(ChatMessage {
                            role: field_text(obj, "role").unwrap_or_default(),
                            content: field_text(obj, "content").unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            conversation_hash: field_text(row, "conversation_hash"),
            hashed_ip: field_text(row, "hashed_ip"),
            model: field_text(row, "model"),
            timestamp: row.get("timestamp").and_then(parse_hub_timestamp),
            messages,
        }
    }
}

impl WideRecord {
    /// Build a record from a decoded hub row object, leniently.
    ///
    /// Columns beyond `P4`/`R4` are ignored by design.
    pub fn from_row(row: &Map<String, Value>) -> Self {
        let mut record = Self::default();
        for exchange in 0..WIDE_MAX_EXCHANGES {
            record.prompts[exchange] = field_text(row, &format!("P{}", exchange + 1));
            record.responses[exchange] = field_text(row, &format!("R{}", exchange + 1));
        }
        record
    }
}

/// Extract a named field as text, `None` for null/absent/blank values.
fn field_text(row: &Map<String, Value>, name: &str) -> Option<String> {
    value_to_text(row.get(name)?)
}

/// Render a scalar JSON value as text; `None` for null or blank strings.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            if s.trim().is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Parse a hub timestamp value, tolerating RFC 3339 and space-separated forms.
fn parse_hub_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = raw.replacen(' ', "T", 1);
    DateTime::parse_from_rfc3339(&candidate)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn chat_record_parses_full_row() {
        let record = ChatRecord::from_row(&row(json!({
            "conversation_hash": "abc123",
            "hashed_ip": "deadbeef",
            "model": "gpt-4",
            "timestamp": "2024-03-01T08:30:00Z",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
            ],
        })));
        assert_eq!(record.conversation_hash.as_deref(), Some("abc123"));
        assert_eq!(record.hashed_ip.as_deref(), Some("deadbeef"));
        assert_eq!(record.model.as_deref(), Some("gpt-4"));
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.messages[0].role, "user");
        assert_eq!(record.messages[1].content, "hello");
    }

    #[test]
    fn chat_record_defaults_missing_fields() {
        let record = ChatRecord::from_row(&row(json!({})));
        assert_eq!(record, ChatRecord::default());

        let record = ChatRecord::from_row(&row(json!({
            "timestamp": "yesterday-ish",
            "messages": "not a list",
        })));
        assert!(record.timestamp.is_none());
        assert!(record.messages.is_empty());
    }

    #[test]
    fn hub_timestamps_accept_space_separator() {
        let parsed = parse_hub_timestamp(&json!("2023-04-09 13:32:52+00:00")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 4, 9, 13, 32, 52).unwrap());
    }

    #[test]
    fn wide_record_reads_positional_pairs_and_ignores_extras() {
        let record = WideRecord::from_row(&row(json!({
            "P1": "first prompt",
            "R1": "first response",
            "P2": "   ",
            "R2": "orphaned",
            "P5": "beyond the cap",
            "R5": "beyond the cap",
        })));
        assert_eq!(record.prompts[0].as_deref(), Some("first prompt"));
        assert_eq!(record.responses[0].as_deref(), Some("first response"));
        // Blank-after-trim values read as absent.
        assert_eq!(record.prompts[1], None);
        assert_eq!(record.responses[1].as_deref(), Some("orphaned"));
        assert_eq!(record.prompts[2], None);
        assert_eq!(record.responses[3], None);
    }

    #[test]
    fn in_memory_sources_report_len_and_rows() {
        let source = InMemoryWideSource::new("fixture", vec![WideRecord::default()]);
        assert_eq!(source.id(), "fixture");
        assert_eq!(source.len_hint(), Some(1));
        assert!(source.record_at(0).unwrap().is_some());
        assert!(source.record_at(1).unwrap().is_none());
    }
}
