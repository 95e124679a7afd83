use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::types::{ModelName, SessionId, TurnId, UserId};

/// Timestamp format persisted in turn tables (`2024-01-15T10:00:00Z`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One user/assistant exchange — the atomic row of a turn-level table.
///
/// Field order is the persisted column order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Dense sequential id, assigned at emission and rewritten on subsetting.
    pub turn_id: TurnId,
    /// Conversation grouping key.
    pub session_id: SessionId,
    /// User behind the conversation.
    pub user_id: UserId,
    /// Synthetic UTC instant; strictly increasing within one conversation.
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub user_message: String,
    pub assistant_message: String,
    pub model: ModelName,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Always `prompt_tokens + completion_tokens`.
    pub total_tokens: u64,
    pub latency_ms: u64,
    /// USD, rounded to five fractional digits.
    pub cost_usd: f64,
}

/// Conversation size class used by the stratified sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationClass {
    /// Exactly one turn.
    SingleTurn,
    /// Two or more turns.
    MultiTurn,
}

impl ConversationClass {
    /// Classify a conversation by its turn count.
    pub fn from_turn_count(count: usize) -> Self {
        if count == 1 {
            Self::SingleTurn
        } else {
            Self::MultiTurn
        }
    }
}

/// Serde codec for the persisted timestamp column.
pub mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    /// Render a UTC instant in the table format.
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    /// Parse a table-format timestamp back into a UTC instant.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
