//! Flattening pipelines: one source record in, zero or more turns out.
//!
//! Both pipelines walk their source once, front to back, and accumulate the
//! full output in memory before the caller persists it. Turn ids increment
//! globally across the whole run, timestamps are synthetic and strictly
//! increasing within a conversation, and a turn is only emitted when both
//! sides of an exchange are non-empty after trimming.
//!
//! The two pairing policies are deliberately distinct and stay separate:
//! the wide shape pairs strictly by column position, the message-list shape
//! pairs each assistant message with the latest pending user message.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::info;

use crate::constants::flatten::{
    CHAT_FALLBACK_MODEL, CHAT_FALLBACK_SPACING_SECS, CHAT_PROGRESS_STRIDE, CHAT_TURN_SPACING_SECS,
    WIDE_CONVERSATION_SPACING_SECS, WIDE_MAX_EXCHANGES, WIDE_MODEL_POOL, WIDE_PROGRESS_STRIDE,
    WIDE_TURN_SPACING_SECS, WIDE_USER_ID_MAX, WIDE_USER_ID_MIN,
};
use crate::errors::PrepError;
use crate::rng::PrepRng;
use crate::source::{ChatRecordSource, WideRecordSource};
use crate::turn::Turn;
use crate::usage::synthetic_usage;

/// Base timestamp for wide-source conversations (they carry no timestamps).
fn wide_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0)
        .single()
        .expect("fixed epoch is valid")
}

/// Fallback base timestamp for message-list records without a usable timestamp.
fn chat_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed epoch is valid")
}

fn source_len(id: &str, len_hint: Option<usize>) -> Result<usize, PrepError> {
    len_hint.ok_or_else(|| PrepError::SourceInconsistent {
        source_id: id.to_string(),
        details: "source did not provide len_hint".to_string(),
    })
}

fn trimmed_nonempty(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Flatten a wide-column source into turn rows.
///
/// Each record becomes one conversation with a position-derived session id
/// (`sess_00001`, …), a synthetic user id, a randomly assigned model, and a
/// base timestamp spaced five minutes after the previous conversation.
/// Pairs are consumed strictly by column position; a pair with either side
/// blank is skipped, later pairs are still examined.
pub fn flatten_wide(
    source: &dyn WideRecordSource,
    rng: &mut PrepRng,
) -> Result<Vec<Turn>, PrepError> {
    let total = source_len(source.id(), source.len_hint())?;
    let epoch = wide_epoch();
    let mut turns = Vec::new();
    let mut next_turn_id = 1u64;

    for idx in 0..total {
        let Some(record) = source.record_at(idx)? else {
            continue;
        };

        let session_id = format!("sess_{:05}", idx + 1);
        let user_id = format!("user_{}", rng.random_range(WIDE_USER_ID_MIN..=WIDE_USER_ID_MAX));
        let model = WIDE_MODEL_POOL
            .choose(rng)
            .copied()
            .unwrap_or(WIDE_MODEL_POOL[0]);
        let session_start =
            epoch + Duration::seconds(idx as i64 * WIDE_CONVERSATION_SPACING_SECS);

        for exchange in 0..WIDE_MAX_EXCHANGES {
            let Some(user_message) = trimmed_nonempty(record.prompts[exchange].as_deref()) else {
                continue;
            };
            let Some(assistant_message) =
                trimmed_nonempty(record.responses[exchange].as_deref())
            else {
                continue;
            };

            let usage = synthetic_usage(user_message, assistant_message, model, rng);
            turns.push(Turn {
                turn_id: next_turn_id,
                session_id: session_id.clone(),
                user_id: user_id.clone(),
                timestamp: session_start
                    + Duration::seconds(exchange as i64 * WIDE_TURN_SPACING_SECS),
                user_message: user_message.to_string(),
                assistant_message: assistant_message.to_string(),
                model: model.to_string(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                latency_ms: usage.latency_ms,
                cost_usd: usage.cost_usd,
            });
            next_turn_id += 1;
        }

        if (idx + 1) % WIDE_PROGRESS_STRIDE == 0 {
            info!(
                source = source.id(),
                processed = idx + 1,
                turns = turns.len(),
                "flattening wide conversations"
            );
        }
    }
    Ok(turns)
}

/// Flatten a message-list source into turn rows.
///
/// Walks each record's messages in order, tracking the latest pending user
/// message. An assistant message pairs with and clears the pending message;
/// an assistant message with nothing pending is dropped; a user message
/// replaces any previous pending one. Blank messages are skipped without
/// touching pending state. Turn timestamps advance 30 seconds per emitted
/// turn from the record's own timestamp, falling back to a position-derived
/// base one hour apart.
pub fn flatten_chat(
    source: &dyn ChatRecordSource,
    rng: &mut PrepRng,
) -> Result<Vec<Turn>, PrepError> {
    let total = source_len(source.id(), source.len_hint())?;
    let epoch = chat_epoch();
    let mut turns = Vec::new();
    let mut next_turn_id = 1u64;

    for idx in 0..total {
        let Some(record) = source.record_at(idx)? else {
            continue;
        };

        let session_id = record
            .conversation_hash
            .clone()
            .unwrap_or_else(|| format!("conv_{idx}"));
        let user_id = record
            .hashed_ip
            .clone()
            .unwrap_or_else(|| format!("user_{idx}"));
        let model = record
            .model
            .clone()
            .unwrap_or_else(|| CHAT_FALLBACK_MODEL.to_string());
        let base_timestamp = record
            .timestamp
            .unwrap_or_else(|| epoch + Duration::seconds(idx as i64 * CHAT_FALLBACK_SPACING_SECS));

        let mut pending_user: Option<String> = None;
        let mut turn_seq = 1i64;
        for message in &record.messages {
            let content = message.content.trim();
            if content.is_empty() {
                continue;
            }
            match message.role.as_str() {
                "user" => pending_user = Some(content.to_string()),
                "assistant" => {
                    let Some(user_message) = pending_user.take() else {
                        continue;
                    };
                    let usage = synthetic_usage(&user_message, content, &model, rng);
                    turns.push(Turn {
                        turn_id: next_turn_id,
                        session_id: session_id.clone(),
                        user_id: user_id.clone(),
                        timestamp: base_timestamp
                            + Duration::seconds(turn_seq * CHAT_TURN_SPACING_SECS),
                        user_message,
                        assistant_message: content.to_string(),
                        model: model.clone(),
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                        total_tokens: usage.total_tokens,
                        latency_ms: usage.latency_ms,
                        cost_usd: usage.cost_usd,
                    });
                    next_turn_id += 1;
                    turn_seq += 1;
                }
                _ => {}
            }
        }

        if (idx + 1) % CHAT_PROGRESS_STRIDE == 0 {
            info!(
                source = source.id(),
                processed = idx + 1,
                turns = turns.len(),
                "flattening message-list conversations"
            );
        }
    }
    Ok(turns)
}
