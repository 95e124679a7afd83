use std::fs;

use chrono::{Duration, TimeZone, Utc};
use indexmap::IndexMap;

use turns::{
    PrepRng, SeedMode, SubsetTargets, Turn, read_turns, stratified_subset, write_turns,
};

/// Build a table with `singles` one-turn conversations followed by `multis`
/// three-turn conversations, turn ids dense from 1.
fn build_table(singles: usize, multis: usize) -> Vec<Turn> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut rows = Vec::new();
    let mut id = 1u64;
    for session in 0..singles {
        rows.push(row(id, &format!("single_{session:05}"), base));
        id += 1;
    }
    for session in 0..multis {
        for _ in 0..3 {
            rows.push(row(id, &format!("multi_{session:05}"), base));
            id += 1;
        }
    }
    rows
}

fn row(id: u64, session_id: &str, base: chrono::DateTime<Utc>) -> Turn {
    Turn {
        turn_id: id,
        session_id: session_id.to_string(),
        user_id: "user_314".to_string(),
        timestamp: base + Duration::seconds(id as i64 * 30),
        user_message: format!("question {id}"),
        assistant_message: format!("answer {id}"),
        model: "claude-2".to_string(),
        prompt_tokens: 3,
        completion_tokens: 4,
        total_tokens: 7,
        latency_ms: 1400,
        cost_usd: 0.00012,
    }
}

#[test]
fn under_populated_pools_clamp_and_select_everything() {
    let rows = build_table(280, 150);
    let expected_turns = 280 + 150 * 3;
    assert_eq!(rows.len(), expected_turns);

    let mut rng = PrepRng::new(SeedMode::Fixed(42));
    let report = stratified_subset(
        rows,
        SubsetTargets {
            single_turn: 300,
            multi_turn: 200,
        },
        &mut rng,
    );

    assert_eq!(report.single_selected, 280);
    assert_eq!(report.multi_selected, 150);
    assert_eq!(report.conversations(), 430);
    assert_eq!(report.turns.len(), expected_turns);
    for (position, turn) in report.turns.iter().enumerate() {
        assert_eq!(turn.turn_id, position as u64 + 1);
    }
}

#[test]
fn selected_conversations_are_carried_intact() {
    let rows = build_table(40, 25);
    let mut rng = PrepRng::new(SeedMode::Fixed(42));
    let report = stratified_subset(
        rows,
        SubsetTargets {
            single_turn: 10,
            multi_turn: 8,
        },
        &mut rng,
    );

    let mut sizes: IndexMap<String, usize> = IndexMap::new();
    for turn in &report.turns {
        *sizes.entry(turn.session_id.clone()).or_default() += 1;
    }
    assert_eq!(sizes.len(), 18);
    for (session_id, size) in sizes {
        let expected = if session_id.starts_with("multi") { 3 } else { 1 };
        assert_eq!(size, expected, "conversation {session_id} was split");
    }
}

#[test]
fn intra_conversation_order_survives_renumbering() {
    let rows = build_table(5, 5);
    let mut rng = PrepRng::new(SeedMode::Fixed(42));
    let report = stratified_subset(
        rows,
        SubsetTargets {
            single_turn: 3,
            multi_turn: 4,
        },
        &mut rng,
    );

    let mut last_message_id: IndexMap<String, u64> = IndexMap::new();
    for turn in &report.turns {
        // The original emission order is recoverable from the message text.
        let original: u64 = turn
            .user_message
            .strip_prefix("question ")
            .unwrap()
            .parse()
            .unwrap();
        if let Some(previous) = last_message_id.insert(turn.session_id.clone(), original) {
            assert!(
                previous < original,
                "order inside {} regressed: {} after {}",
                turn.session_id,
                original,
                previous
            );
        }
    }
}

#[test]
fn identical_seed_and_input_produce_byte_identical_files() {
    let rows = build_table(60, 40);
    let dir = tempfile::tempdir().unwrap();
    let targets = SubsetTargets {
        single_turn: 20,
        multi_turn: 10,
    };

    let first_path = dir.path().join("first.csv");
    let mut rng = PrepRng::new(SeedMode::Fixed(42));
    let first = stratified_subset(rows.clone(), targets, &mut rng);
    write_turns(&first_path, &first.turns).unwrap();

    let second_path = dir.path().join("second.csv");
    let mut rng = PrepRng::new(SeedMode::Fixed(42));
    let second = stratified_subset(rows, targets, &mut rng);
    write_turns(&second_path, &second.turns).unwrap();

    let first_bytes = fs::read(&first_path).unwrap();
    let second_bytes = fs::read(&second_path).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn subset_of_persisted_table_round_trips_through_csv() {
    let rows = build_table(10, 6);
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.csv");
    write_turns(&input_path, &rows).unwrap();

    let restored = read_turns(&input_path).unwrap();
    assert_eq!(restored, rows);

    let mut rng = PrepRng::new(SeedMode::Fixed(42));
    let report = stratified_subset(
        restored,
        SubsetTargets {
            single_turn: 4,
            multi_turn: 2,
        },
        &mut rng,
    );
    assert_eq!(report.conversations(), 6);
    assert_eq!(report.turns.len(), 4 + 2 * 3);

    let output_path = dir.path().join("output.csv");
    write_turns(&output_path, &report.turns).unwrap();
    let reread = read_turns(&output_path).unwrap();
    assert_eq!(reread, report.turns);
}
