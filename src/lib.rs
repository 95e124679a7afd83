#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// CLI runners for the data-preparation binaries.
pub mod apps;
/// Centralized constants used across flattening, sampling, and persistence.
pub mod constants;
/// Flattening pipelines for both source shapes.
pub mod flatten;
/// Explicitly constructed random sources.
pub mod rng;
/// Conversation source traits and built-in sources.
pub mod source;
/// Stratified conversation subsetting.
pub mod subset;
/// Turn-table persistence helpers.
pub mod table;
/// The turn record and conversation classification.
pub mod turn;
/// Shared type aliases.
pub mod types;
/// Synthetic usage metadata.
pub mod usage;

mod errors;

pub use errors::PrepError;
pub use flatten::{flatten_chat, flatten_wide};
pub use rng::{PrepRng, SeedMode};
pub use source::{
    ChatMessage, ChatRecord, ChatRecordSource, InMemoryChatSource, InMemoryWideSource, WideRecord,
    WideRecordSource,
};
#[cfg(feature = "huggingface")]
pub use source::{HubTableConfig, HuggingFaceChatSource, HuggingFaceWideSource};
pub use subset::{SubsetReport, SubsetTargets, stratified_subset};
pub use table::{read_turns, write_turns};
pub use turn::{ConversationClass, Turn};
pub use types::{ModelName, SessionId, SourceId, TurnId, UserId};
pub use usage::{ModelPricing, UsageMetadata, estimate_tokens, synthetic_usage, unit_prices};
