use crate::usage::ModelPricing;

/// Constants used by the synthetic usage-metadata generator.
pub mod usage {
    use super::ModelPricing;

    /// Characters per token in the fixed length-based approximation.
    pub const CHARS_PER_TOKEN: u64 = 4;
    /// Lower bound of the base latency draw, in milliseconds.
    pub const LATENCY_BASE_MIN_MS: u64 = 1000;
    /// Upper bound of the base latency draw, in milliseconds.
    pub const LATENCY_BASE_MAX_MS: u64 = 2000;
    /// Lower bound of the per-completion-token latency factor.
    pub const LATENCY_PER_TOKEN_MIN_MS: u64 = 80;
    /// Upper bound of the per-completion-token latency factor.
    pub const LATENCY_PER_TOKEN_MAX_MS: u64 = 120;
    /// Fractional digits kept when rounding `cost_usd`.
    pub const COST_DECIMALS: i32 = 5;

    /// USD per 1k tokens for `gpt-4` (non-turbo).
    pub const PRICE_GPT_4: ModelPricing = ModelPricing {
        input_per_1k: 0.03,
        output_per_1k: 0.06,
    };
    /// USD per 1k tokens for `gpt-4-turbo`.
    pub const PRICE_GPT_4_TURBO: ModelPricing = ModelPricing {
        input_per_1k: 0.01,
        output_per_1k: 0.03,
    };
    /// USD per 1k tokens for `gpt-3.5-turbo`.
    pub const PRICE_GPT_3_5_TURBO: ModelPricing = ModelPricing {
        input_per_1k: 0.0015,
        output_per_1k: 0.002,
    };
    /// USD per 1k tokens for the `claude-3` sonnet tier.
    pub const PRICE_CLAUDE_3: ModelPricing = ModelPricing {
        input_per_1k: 0.003,
        output_per_1k: 0.015,
    };
    /// USD per 1k tokens for `claude-2`.
    pub const PRICE_CLAUDE_2: ModelPricing = ModelPricing {
        input_per_1k: 0.008,
        output_per_1k: 0.024,
    };
    /// USD per 1k tokens for `claude-instant`.
    pub const PRICE_CLAUDE_INSTANT: ModelPricing = ModelPricing {
        input_per_1k: 0.0016,
        output_per_1k: 0.0055,
    };
    /// USD per 1k tokens for `deepseek` models.
    pub const PRICE_DEEPSEEK: ModelPricing = ModelPricing {
        input_per_1k: 0.0014,
        output_per_1k: 0.0028,
    };
    /// Fallback USD per 1k tokens when no table entry matches.
    pub const PRICE_DEFAULT: ModelPricing = ModelPricing {
        input_per_1k: 0.001,
        output_per_1k: 0.002,
    };
}

/// Constants used by the flattening pipelines.
pub mod flatten {
    /// Maximum prompt/response pairs carried by a wide-column record.
    pub const WIDE_MAX_EXCHANGES: usize = 4;
    /// Model pool for random per-conversation assignment in the wide pipeline.
    pub const WIDE_MODEL_POOL: [&str; 4] =
        ["gpt-4", "gpt-3.5-turbo", "claude-2", "claude-instant"];
    /// Inclusive lower bound of the synthetic numeric user id.
    pub const WIDE_USER_ID_MIN: u64 = 100;
    /// Inclusive upper bound of the synthetic numeric user id.
    pub const WIDE_USER_ID_MAX: u64 = 999;
    /// Seconds between consecutive conversation base timestamps (wide source).
    pub const WIDE_CONVERSATION_SPACING_SECS: i64 = 300;
    /// Seconds between consecutive turns within one wide conversation.
    pub const WIDE_TURN_SPACING_SECS: i64 = 60;
    /// Progress event stride for the wide pipeline, in source records.
    pub const WIDE_PROGRESS_STRIDE: usize = 100;
    /// Seconds between consecutive turns within one message-list conversation.
    pub const CHAT_TURN_SPACING_SECS: i64 = 30;
    /// Seconds between fallback base timestamps of consecutive message-list records.
    pub const CHAT_FALLBACK_SPACING_SECS: i64 = 3600;
    /// Progress event stride for the message-list pipeline, in source records.
    pub const CHAT_PROGRESS_STRIDE: usize = 1000;
    /// Model label used when a message-list record carries none.
    pub const CHAT_FALLBACK_MODEL: &str = "unknown";
}

/// Constants used by the stratified subset sampler.
pub mod subset {
    /// Fixed seed that makes subset runs reproducible by default.
    pub const DEFAULT_SEED: u64 = 42;
    /// Default number of single-turn conversations to select.
    pub const DEFAULT_SINGLE_TURN_TARGET: usize = 300;
    /// Default number of multi-turn conversations to select.
    pub const DEFAULT_MULTI_TURN_TARGET: usize = 200;
}

/// Constants used by turn-table persistence.
pub mod table {
    /// Canonical column order shared by flattener output and sampler input/output.
    pub const TURN_COLUMNS: [&str; 12] = [
        "turn_id",
        "session_id",
        "user_id",
        "timestamp",
        "user_message",
        "assistant_message",
        "model",
        "prompt_tokens",
        "completion_tokens",
        "total_tokens",
        "latency_ms",
        "cost_usd",
    ];
}

/// Constants used by hub-backed sources and the CLI runners.
pub mod hub {
    /// Message-list dataset id (public).
    pub const WILDCHAT_DATASET: &str = "allenai/wildchat-r1-p2-format-filtered";
    /// Wide-column dataset id (access-gated).
    pub const MULTITURN_DATASET: &str = "SoftAge-AI/multi-turn_dataset";
    /// Split consumed by both flatteners.
    pub const DEFAULT_SPLIT: &str = "train";
    /// Environment variable consulted for the gated-dataset credential.
    pub const TOKEN_ENV_VAR: &str = "HF_TOKEN";
    /// File extensions accepted as snapshot shard files.
    pub const SHARD_EXTENSIONS: [&str; 3] = ["parquet", "jsonl", "ndjson"];
    /// Rows between byte-offset checkpoints while indexing a JSONL shard.
    pub const CHECKPOINT_STRIDE: usize = 4096;
    /// Hub download retry count passed to the client builder.
    pub const DOWNLOAD_RETRIES: usize = 5;
    /// Where operators obtain an access token.
    pub const TOKEN_SETTINGS_URL: &str = "https://huggingface.co/settings/tokens";
    /// Default snapshot directory for the message-list dataset.
    pub const WILDCHAT_SNAPSHOT_DIR: &str = ".hub_snapshots/wildchat";
    /// Default snapshot directory for the wide-column dataset.
    pub const MULTITURN_SNAPSHOT_DIR: &str = ".hub_snapshots/multiturn";
}
