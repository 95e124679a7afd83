/// Identifier grouping turns into a conversation.
/// Examples: `sess_00042`, `79a3f07189d1...` (a conversation hash)
pub type SessionId = String;
/// Identifier for the user behind a conversation.
/// Examples: `user_412`, a hashed IP string
pub type UserId = String;
/// Model label attached to a turn.
/// Examples: `gpt-4`, `claude-2`, `unknown`
pub type ModelName = String;
/// Sequential turn identifier, dense `1..=N` within one table.
pub type TurnId = u64;
/// Identifier for the source that produced records.
/// Examples: `wildchat`, `multiturn`
pub type SourceId = String;
