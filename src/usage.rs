//! Synthetic usage metadata for flattened turns.
//!
//! Token counts come from a fixed character-length approximation, latency is
//! drawn from the caller's RNG, and cost is looked up from a substring-keyed
//! price table with a default tier when nothing matches. No input is an
//! error: empty text yields zero tokens, unknown models fall back silently.

use rand::Rng;

use crate::constants::usage::{
    CHARS_PER_TOKEN, COST_DECIMALS, LATENCY_BASE_MAX_MS, LATENCY_BASE_MIN_MS,
    LATENCY_PER_TOKEN_MAX_MS, LATENCY_PER_TOKEN_MIN_MS, PRICE_CLAUDE_2, PRICE_CLAUDE_3,
    PRICE_CLAUDE_INSTANT, PRICE_DEEPSEEK, PRICE_DEFAULT, PRICE_GPT_3_5_TURBO, PRICE_GPT_4,
    PRICE_GPT_4_TURBO,
};
use crate::rng::PrepRng;

/// Input/output unit prices in USD per 1k tokens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelPricing {
    /// USD per 1k prompt tokens.
    pub input_per_1k: f64,
    /// USD per 1k completion tokens.
    pub output_per_1k: f64,
}

/// Synthetic per-turn usage record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UsageMetadata {
    /// Estimated tokens in the user message.
    pub prompt_tokens: u64,
    /// Estimated tokens in the assistant message.
    pub completion_tokens: u64,
    /// Always `prompt_tokens + completion_tokens`.
    pub total_tokens: u64,
    /// Simulated end-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Simulated cost in USD, rounded to five fractional digits.
    pub cost_usd: f64,
}

/// Estimate a token count from text length (~4 chars per token, 0 when empty).
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count() as u64 / CHARS_PER_TOKEN
}

/// Resolve unit prices for a model label.
///
/// Matching is case-insensitive on substrings, most specific tier first.
pub fn unit_prices(model: &str) -> ModelPricing {
    let key = model.to_ascii_lowercase();
    if key.contains("gpt-4") {
        if key.contains("turbo") {
            PRICE_GPT_4_TURBO
        } else {
            PRICE_GPT_4
        }
    } else if key.contains("gpt-3.5") {
        PRICE_GPT_3_5_TURBO
    } else if key.contains("claude-3") {
        PRICE_CLAUDE_3
    } else if key.contains("claude-instant") {
        PRICE_CLAUDE_INSTANT
    } else if key.contains("claude") {
        PRICE_CLAUDE_2
    } else if key.contains("deepseek") {
        PRICE_DEEPSEEK
    } else {
        PRICE_DEFAULT
    }
}

/// Generate token counts, latency, and cost for one exchange.
pub fn synthetic_usage(
    user_message: &str,
    assistant_message: &str,
    model: &str,
    rng: &mut PrepRng,
) -> UsageMetadata {
    let prompt_tokens = estimate_tokens(user_message);
    let completion_tokens = estimate_tokens(assistant_message);

    let base_ms = rng.random_range(LATENCY_BASE_MIN_MS..=LATENCY_BASE_MAX_MS);
    let per_token_ms = rng.random_range(LATENCY_PER_TOKEN_MIN_MS..=LATENCY_PER_TOKEN_MAX_MS);
    let latency_ms = base_ms + completion_tokens * per_token_ms;

    let prices = unit_prices(model);
    let cost = prompt_tokens as f64 / 1000.0 * prices.input_per_1k
        + completion_tokens as f64 / 1000.0 * prices.output_per_1k;

    UsageMetadata {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
        latency_ms,
        cost_usd: round_usd(cost),
    }
}

/// Round a cost to the persisted precision.
pub fn round_usd(cost: f64) -> f64 {
    let scale = 10f64.powi(COST_DECIMALS);
    (cost * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeedMode;

    #[test]
    fn estimate_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefg"), 1);
        // 4 multibyte chars are one token regardless of encoded size.
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn price_lookup_prefers_most_specific_tier() {
        assert_eq!(unit_prices("GPT-4"), PRICE_GPT_4);
        assert_eq!(unit_prices("gpt-4-turbo-preview"), PRICE_GPT_4_TURBO);
        assert_eq!(unit_prices("gpt-3.5-turbo-0613"), PRICE_GPT_3_5_TURBO);
        assert_eq!(unit_prices("claude-3-sonnet"), PRICE_CLAUDE_3);
        assert_eq!(unit_prices("claude-instant-1"), PRICE_CLAUDE_INSTANT);
        assert_eq!(unit_prices("claude-2.1"), PRICE_CLAUDE_2);
        assert_eq!(unit_prices("deepseek-r1"), PRICE_DEEPSEEK);
    }

    #[test]
    fn price_lookup_falls_back_to_default() {
        assert_eq!(unit_prices("llama-70b"), PRICE_DEFAULT);
        assert_eq!(unit_prices(""), PRICE_DEFAULT);
    }

    #[test]
    fn usage_preserves_token_sum_invariant() {
        let mut rng = PrepRng::new(SeedMode::Fixed(5));
        let usage = synthetic_usage(&"x".repeat(400), &"y".repeat(800), "gpt-4", &mut rng);
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 200);
        assert_eq!(usage.total_tokens, 300);
        assert!(usage.latency_ms >= LATENCY_BASE_MIN_MS + 200 * LATENCY_PER_TOKEN_MIN_MS);
        assert!(usage.latency_ms <= LATENCY_BASE_MAX_MS + 200 * LATENCY_PER_TOKEN_MAX_MS);
    }

    #[test]
    fn cost_is_priced_and_rounded() {
        let mut rng = PrepRng::new(SeedMode::Fixed(5));
        let usage = synthetic_usage(&"x".repeat(4000), &"y".repeat(4000), "gpt-4", &mut rng);
        // 1000 tokens each way at 0.03/0.06 per 1k.
        assert_eq!(usage.cost_usd, 0.09);

        assert_eq!(round_usd(0.123456789), 0.12346);
        assert_eq!(round_usd(0.0), 0.0);
    }

    #[test]
    fn empty_messages_cost_only_base_latency() {
        let mut rng = PrepRng::new(SeedMode::Fixed(11));
        let usage = synthetic_usage("", "", "gpt-4", &mut rng);
        assert_eq!(usage.total_tokens, 0);
        assert_eq!(usage.cost_usd, 0.0);
        assert!(usage.latency_ms >= LATENCY_BASE_MIN_MS);
        assert!(usage.latency_ms <= LATENCY_BASE_MAX_MS);
    }
}
