use chrono::{TimeZone, Utc};

use turns::constants::flatten::WIDE_MODEL_POOL;
use turns::source::{
    ChatMessage, ChatRecord, InMemoryChatSource, InMemoryWideSource, WideRecord,
};
use turns::{PrepRng, SeedMode, Turn, flatten_chat, flatten_wide};

fn chat_record(messages: &[(&str, &str)]) -> ChatRecord {
    ChatRecord {
        conversation_hash: None,
        hashed_ip: None,
        model: Some("gpt-4".to_string()),
        timestamp: None,
        messages: messages
            .iter()
            .map(|(role, content)| ChatMessage {
                role: role.to_string(),
                content: content.to_string(),
            })
            .collect(),
    }
}

fn wide_record(pairs: &[(Option<&str>, Option<&str>)]) -> WideRecord {
    let mut record = WideRecord::default();
    for (idx, (prompt, response)) in pairs.iter().enumerate() {
        record.prompts[idx] = prompt.map(str::to_string);
        record.responses[idx] = response.map(str::to_string);
    }
    record
}

fn assert_turn_invariants(turns: &[Turn]) {
    for (position, turn) in turns.iter().enumerate() {
        assert_eq!(turn.turn_id, position as u64 + 1, "ids must be dense from 1");
        assert_eq!(turn.total_tokens, turn.prompt_tokens + turn.completion_tokens);
        assert!(!turn.user_message.trim().is_empty());
        assert!(!turn.assistant_message.trim().is_empty());
        assert!(turn.latency_ms > 0);
        assert!(turn.cost_usd >= 0.0);
    }
}

fn assert_timestamps_increase_within_sessions(turns: &[Turn]) {
    for pair in turns.windows(2) {
        if pair[0].session_id == pair[1].session_id {
            assert!(
                pair[0].timestamp < pair[1].timestamp,
                "timestamps must strictly increase within session {}",
                pair[0].session_id
            );
        }
    }
}

#[test]
fn wide_flattening_emits_only_complete_pairs() {
    // P1="hi", R1="hello", P2="", R2="bye" — only the first pair survives.
    let source = InMemoryWideSource::new(
        "wide",
        vec![wide_record(&[
            (Some("hi"), Some("hello")),
            (Some(""), Some("bye")),
        ])],
    );
    let mut rng = PrepRng::new(SeedMode::Fixed(17));
    let turns = flatten_wide(&source, &mut rng).unwrap();

    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_message, "hi");
    assert_eq!(turns[0].assistant_message, "hello");
    assert_turn_invariants(&turns);
}

#[test]
fn wide_flattening_spans_conversations_with_global_ids() {
    let records = vec![
        wide_record(&[(Some("a1"), Some("b1")), (Some("a2"), Some("b2"))]),
        wide_record(&[(None, None)]),
        wide_record(&[(Some("c1"), Some("d1"))]),
    ];
    let source = InMemoryWideSource::new("wide", records);
    let mut rng = PrepRng::new(SeedMode::Fixed(17));
    let turns = flatten_wide(&source, &mut rng).unwrap();

    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].session_id, "sess_00001");
    assert_eq!(turns[1].session_id, "sess_00001");
    // The empty record still consumes its positional session slot.
    assert_eq!(turns[2].session_id, "sess_00003");
    assert!(WIDE_MODEL_POOL.contains(&turns[0].model.as_str()));
    assert_turn_invariants(&turns);
    assert_timestamps_increase_within_sessions(&turns);
}

#[test]
fn chat_flattening_pairs_latest_pending_user_message() {
    let source = InMemoryChatSource::new(
        "chat",
        vec![chat_record(&[("user", "a"), ("user", "b"), ("assistant", "c")])],
    );
    let mut rng = PrepRng::new(SeedMode::Fixed(17));
    let turns = flatten_chat(&source, &mut rng).unwrap();

    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_message, "b");
    assert_eq!(turns[0].assistant_message, "c");
    assert_turn_invariants(&turns);
}

#[test]
fn chat_flattening_drops_unmatched_assistant_messages() {
    let source = InMemoryChatSource::new(
        "chat",
        vec![chat_record(&[
            ("assistant", "x"),
            ("user", "a"),
            ("assistant", "b"),
        ])],
    );
    let mut rng = PrepRng::new(SeedMode::Fixed(17));
    let turns = flatten_chat(&source, &mut rng).unwrap();

    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_message, "a");
    assert_eq!(turns[0].assistant_message, "b");
}

#[test]
fn chat_flattening_orders_turns_and_honors_record_timestamps() {
    let base = Utc.with_ymd_and_hms(2023, 11, 5, 9, 0, 0).unwrap();
    let mut timestamped = chat_record(&[
        ("user", "one"),
        ("assistant", "two"),
        ("user", "three"),
        ("assistant", "four"),
    ]);
    timestamped.timestamp = Some(base);
    let source = InMemoryChatSource::new(
        "chat",
        vec![
            timestamped,
            chat_record(&[("user", "later"), ("assistant", "reply")]),
        ],
    );
    let mut rng = PrepRng::new(SeedMode::Fixed(17));
    let turns = flatten_chat(&source, &mut rng).unwrap();

    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].timestamp, base + chrono::Duration::seconds(30));
    assert_eq!(turns[1].timestamp, base + chrono::Duration::seconds(60));
    assert_turn_invariants(&turns);
    assert_timestamps_increase_within_sessions(&turns);
}

#[test]
fn both_pipelines_are_deterministic_for_a_fixed_seed() {
    let chat_source = InMemoryChatSource::new(
        "chat",
        vec![
            chat_record(&[("user", "alpha"), ("assistant", "beta")]),
            chat_record(&[("user", "gamma"), ("assistant", "delta")]),
        ],
    );
    let mut rng_a = PrepRng::new(SeedMode::Fixed(99));
    let mut rng_b = PrepRng::new(SeedMode::Fixed(99));
    assert_eq!(
        flatten_chat(&chat_source, &mut rng_a).unwrap(),
        flatten_chat(&chat_source, &mut rng_b).unwrap()
    );

    let wide_source = InMemoryWideSource::new(
        "wide",
        vec![wide_record(&[(Some("p"), Some("r"))])],
    );
    let mut rng_c = PrepRng::new(SeedMode::Fixed(99));
    let mut rng_d = PrepRng::new(SeedMode::Fixed(99));
    assert_eq!(
        flatten_wide(&wide_source, &mut rng_c).unwrap(),
        flatten_wide(&wide_source, &mut rng_d).unwrap()
    );
}
