//! Stratified conversation subsetting.
//!
//! The sampler reconstructs conversations by grouping turn rows under their
//! session id (first-seen order), classifies each conversation as
//! single-turn or multi-turn, and draws a seeded uniform sample without
//! replacement from each class. Selected conversations are carried intact;
//! only `turn_id` is rewritten, back to a dense `1..=N` sequence in global
//! original-id order. Under-populated pools clamp the target down with a
//! warning instead of failing.

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use tracing::warn;

use crate::constants::subset::{DEFAULT_MULTI_TURN_TARGET, DEFAULT_SINGLE_TURN_TARGET};
use crate::rng::PrepRng;
use crate::turn::{ConversationClass, Turn};
use crate::types::SessionId;

/// Per-class conversation counts requested from the sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubsetTargets {
    /// Conversations with exactly one turn.
    pub single_turn: usize,
    /// Conversations with two or more turns.
    pub multi_turn: usize,
}

impl Default for SubsetTargets {
    fn default() -> Self {
        Self {
            single_turn: DEFAULT_SINGLE_TURN_TARGET,
            multi_turn: DEFAULT_MULTI_TURN_TARGET,
        }
    }
}

/// Outcome of one subset draw.
#[derive(Clone, Debug)]
pub struct SubsetReport {
    /// Single-turn conversations selected (after clamping).
    pub single_selected: usize,
    /// Multi-turn conversations selected (after clamping).
    pub multi_selected: usize,
    /// Single-turn conversations available in the input.
    pub single_available: usize,
    /// Multi-turn conversations available in the input.
    pub multi_available: usize,
    /// Selected rows, renumbered densely in original turn-id order.
    pub turns: Vec<Turn>,
}

impl SubsetReport {
    /// Total conversations selected across both classes.
    pub fn conversations(&self) -> usize {
        self.single_selected + self.multi_selected
    }
}

/// Draw a stratified subset of conversations from a turn table.
///
/// Deterministic for a fixed input and RNG seed: grouping preserves
/// first-seen order, selection consumes the RNG in class order
/// (single-turn first), and output rows are sorted by original `turn_id`
/// before renumbering, so no set iteration order reaches the output.
pub fn stratified_subset(
    rows: Vec<Turn>,
    targets: SubsetTargets,
    rng: &mut PrepRng,
) -> SubsetReport {
    let mut conversations: IndexMap<SessionId, Vec<Turn>> = IndexMap::new();
    for row in rows {
        conversations
            .entry(row.session_id.clone())
            .or_default()
            .push(row);
    }

    let mut single_pool: Vec<SessionId> = Vec::new();
    let mut multi_pool: Vec<SessionId> = Vec::new();
    for (session_id, group) in &conversations {
        match ConversationClass::from_turn_count(group.len()) {
            ConversationClass::SingleTurn => single_pool.push(session_id.clone()),
            ConversationClass::MultiTurn => multi_pool.push(session_id.clone()),
        }
    }

    let single_target = clamp_target("single-turn", single_pool.len(), targets.single_turn);
    let multi_target = clamp_target("multi-turn", multi_pool.len(), targets.multi_turn);

    let selected: HashSet<SessionId> = single_pool
        .choose_multiple(rng, single_target)
        .cloned()
        .chain(multi_pool.choose_multiple(rng, multi_target).cloned())
        .collect();

    let mut turns: Vec<Turn> = conversations
        .into_iter()
        .filter(|(session_id, _)| selected.contains(session_id))
        .flat_map(|(_, group)| group)
        .collect();
    turns.sort_by_key(|turn| turn.turn_id);
    for (position, turn) in turns.iter_mut().enumerate() {
        turn.turn_id = position as u64 + 1;
    }

    SubsetReport {
        single_selected: single_target,
        multi_selected: multi_target,
        single_available: single_pool.len(),
        multi_available: multi_pool.len(),
        turns,
    }
}

fn clamp_target(class: &str, available: usize, target: usize) -> usize {
    if available < target {
        warn!(
            class,
            available, target, "not enough conversations, clamping target to pool size"
        );
        available
    } else {
        target
    }
}
