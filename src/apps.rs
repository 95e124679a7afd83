//! CLI definitions and runner functions for the data-preparation binaries.
//!
//! Each runner is a single pass: resolve configuration, read the source,
//! transform, write one output file, print a summary, exit. The only fatal
//! startup condition is a missing access credential for the gated dataset.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};

use crate::constants::subset::{
    DEFAULT_MULTI_TURN_TARGET, DEFAULT_SEED, DEFAULT_SINGLE_TURN_TARGET,
};
use crate::rng::{PrepRng, SeedMode};
use crate::subset::{SubsetTargets, stratified_subset};
use crate::table::{read_turns, write_turns};

#[cfg(feature = "huggingface")]
use crate::constants::hub::{
    DEFAULT_SPLIT, MULTITURN_DATASET, MULTITURN_SNAPSHOT_DIR, TOKEN_ENV_VAR, TOKEN_SETTINGS_URL,
    WILDCHAT_DATASET, WILDCHAT_SNAPSHOT_DIR,
};
#[cfg(feature = "huggingface")]
use crate::errors::PrepError;
#[cfg(feature = "huggingface")]
use crate::flatten::{flatten_chat, flatten_wide};
#[cfg(feature = "huggingface")]
use crate::source::{
    ChatRecordSource, HubTableConfig, HuggingFaceChatSource, HuggingFaceWideSource,
    WideRecordSource,
};

#[cfg(feature = "huggingface")]
#[derive(Debug, Parser)]
#[command(
    name = "flatten-wildchat",
    disable_help_subcommand = true,
    about = "Flatten a message-list conversation dataset into a turn-level CSV table",
    after_help = "The source dataset is public; no credential is required. Shards are \
                  materialized under the snapshot directory on first run and reused afterwards."
)]
struct FlattenWildchatCli {
    #[arg(
        long = "snapshot-dir",
        value_name = "DIR",
        default_value = WILDCHAT_SNAPSHOT_DIR,
        help = "Directory holding (or receiving) local shard files"
    )]
    snapshot_dir: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        default_value = "wildchat-turns.csv",
        help = "Output CSV path"
    )]
    output: PathBuf,
    #[arg(
        long = "max-rows",
        value_name = "N",
        help = "Cap the number of source conversations processed"
    )]
    max_rows: Option<usize>,
    #[arg(long, help = "Optional deterministic seed for synthetic metadata")]
    seed: Option<u64>,
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Parser)]
#[command(
    name = "flatten-multiturn",
    disable_help_subcommand = true,
    about = "Flatten a wide-column (P1..P4/R1..R4) dataset into a turn-level CSV table",
    after_help = "The source dataset is access-gated: pass a hub token as the positional \
                  argument or export it via HF_TOKEN before running."
)]
struct FlattenMultiturnCli {
    #[arg(
        value_name = "TOKEN",
        help = "Hub access token (falls back to the HF_TOKEN environment variable)"
    )]
    token: Option<String>,
    #[arg(
        long = "snapshot-dir",
        value_name = "DIR",
        default_value = MULTITURN_SNAPSHOT_DIR,
        help = "Directory holding (or receiving) local shard files"
    )]
    snapshot_dir: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        default_value = "multiturn-turns.csv",
        help = "Output CSV path"
    )]
    output: PathBuf,
    #[arg(
        long = "max-rows",
        value_name = "N",
        help = "Cap the number of source conversations processed"
    )]
    max_rows: Option<usize>,
    #[arg(long, help = "Optional deterministic seed for synthetic metadata")]
    seed: Option<u64>,
}

#[derive(Debug, Parser)]
#[command(
    name = "sample-subset",
    disable_help_subcommand = true,
    about = "Draw a reproducible stratified subset of conversations from a turn table",
    after_help = "Targets clamp down to the available pool sizes with a warning; the fixed \
                  default seed makes repeated runs byte-identical for identical input."
)]
struct SampleSubsetCli {
    #[arg(
        long,
        value_name = "FILE",
        default_value = "wildchat-turns.csv",
        help = "Input turn table"
    )]
    input: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        default_value = "subset-turns.csv",
        help = "Output CSV path"
    )]
    output: PathBuf,
    #[arg(
        long = "single-turn",
        value_name = "N",
        default_value_t = DEFAULT_SINGLE_TURN_TARGET,
        help = "Target number of single-turn conversations"
    )]
    single_turn: usize,
    #[arg(
        long = "multi-turn",
        value_name = "N",
        default_value_t = DEFAULT_MULTI_TURN_TARGET,
        help = "Target number of multi-turn conversations"
    )]
    multi_turn: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_SEED,
        help = "Deterministic seed for the stratified draw"
    )]
    seed: u64,
}

/// Flatten the public message-list dataset into a turn table.
#[cfg(feature = "huggingface")]
pub fn run_flatten_wildchat<I>(args: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator<Item = String>,
{
    init_tracing();
    let Some(cli) = parse_cli::<FlattenWildchatCli, _>(
        std::iter::once("flatten-wildchat".to_string()).chain(args),
    )?
    else {
        return Ok(());
    };

    let mut config = HubTableConfig::new(
        "wildchat",
        WILDCHAT_DATASET,
        DEFAULT_SPLIT,
        cli.snapshot_dir,
    );
    if let Some(max_rows) = cli.max_rows {
        config = config.with_max_rows(max_rows);
    }

    println!("Loading dataset {WILDCHAT_DATASET}...");
    let source = HuggingFaceChatSource::open(config)?;
    let conversations = source.len_hint().unwrap_or(0);
    println!("Loaded {conversations} conversations");

    println!("Transforming to turn-level format...");
    let mut rng = PrepRng::new(seed_mode(cli.seed));
    let turns = flatten_chat(&source, &mut rng)?;

    write_turns(&cli.output, &turns)?;
    print_flatten_summary(&cli.output, conversations, turns.len());
    Ok(())
}

/// Flatten the gated wide-column dataset into a turn table.
///
/// Fails before any hub traffic when no credential is available.
#[cfg(feature = "huggingface")]
pub fn run_flatten_multiturn<I>(args: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator<Item = String>,
{
    init_tracing();
    let Some(cli) = parse_cli::<FlattenMultiturnCli, _>(
        std::iter::once("flatten-multiturn".to_string()).chain(args),
    )?
    else {
        return Ok(());
    };

    let token = match resolve_hub_token(cli.token) {
        Ok(token) => token,
        Err(err) => {
            eprintln!("ERROR: hub access token required.");
            eprintln!();
            eprintln!("The dataset {MULTITURN_DATASET} is gated. To run this flattener:");
            eprintln!("  1. Create a token at {TOKEN_SETTINGS_URL}");
            eprintln!(
                "  2. Accept the dataset terms at https://huggingface.co/datasets/{MULTITURN_DATASET}"
            );
            eprintln!(
                "  3. Re-run with {TOKEN_ENV_VAR}=<token> exported, or pass the token as the \
                 first argument"
            );
            return Err(err.into());
        }
    };

    let mut config = HubTableConfig::new(
        "multiturn",
        MULTITURN_DATASET,
        DEFAULT_SPLIT,
        cli.snapshot_dir,
    )
    .with_token(token);
    if let Some(max_rows) = cli.max_rows {
        config = config.with_max_rows(max_rows);
    }

    println!("Loading dataset {MULTITURN_DATASET}...");
    let source = HuggingFaceWideSource::open(config)?;
    let conversations = source.len_hint().unwrap_or(0);
    println!("Loaded {conversations} conversations");

    println!("Transforming to turn-level format...");
    let mut rng = PrepRng::new(seed_mode(cli.seed));
    let turns = flatten_wide(&source, &mut rng)?;

    write_turns(&cli.output, &turns)?;
    print_flatten_summary(&cli.output, conversations, turns.len());
    Ok(())
}

/// Draw a stratified conversation subset from an existing turn table.
pub fn run_sample_subset<I>(args: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator<Item = String>,
{
    init_tracing();
    let Some(cli) =
        parse_cli::<SampleSubsetCli, _>(std::iter::once("sample-subset".to_string()).chain(args))?
    else {
        return Ok(());
    };

    println!("Reading turn table {}...", cli.input.display());
    let rows = read_turns(&cli.input)?;
    println!("Loaded {} turns", rows.len());

    let targets = SubsetTargets {
        single_turn: cli.single_turn,
        multi_turn: cli.multi_turn,
    };
    let mut rng = PrepRng::new(SeedMode::Fixed(cli.seed));
    let report = stratified_subset(rows, targets, &mut rng);

    write_turns(&cli.output, &report.turns)?;
    println!(
        "Wrote {} turns to {}",
        report.turns.len(),
        cli.output.display()
    );
    println!(
        "  Single-turn conversations: {} (pool {})",
        report.single_selected, report.single_available
    );
    println!(
        "  Multi-turn conversations:  {} (pool {})",
        report.multi_selected, report.multi_available
    );
    println!("  Total conversations: {}", report.conversations());
    if report.conversations() > 0 {
        println!(
            "  Average turns per conversation: {:.2}",
            report.turns.len() as f64 / report.conversations() as f64
        );
    }
    Ok(())
}

/// Map an optional CLI seed to a seeding policy.
#[cfg(any(feature = "huggingface", test))]
fn seed_mode(seed: Option<u64>) -> SeedMode {
    match seed {
        Some(value) => SeedMode::Fixed(value),
        None => SeedMode::Entropy,
    }
}

/// Resolve the gated-dataset credential: explicit argument, then environment.
#[cfg(feature = "huggingface")]
fn resolve_hub_token(explicit: Option<String>) -> Result<String, PrepError> {
    if let Some(token) = explicit.filter(|token| !token.trim().is_empty()) {
        return Ok(token);
    }
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR)
        && !token.trim().is_empty()
    {
        return Ok(token);
    }
    Err(PrepError::MissingCredential {
        dataset: MULTITURN_DATASET.to_string(),
        env_var: TOKEN_ENV_VAR.to_string(),
    })
}

#[cfg(feature = "huggingface")]
fn print_flatten_summary(output: &std::path::Path, conversations: usize, turns: usize) {
    println!("Wrote {} turns to {}", turns, output.display());
    println!("  Total conversations: {conversations}");
    println!("  Total turns: {turns}");
    if conversations > 0 {
        println!(
            "  Average turns per conversation: {:.2}",
            turns as f64 / conversations as f64
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_mode_tags_explicit_and_entropy_seeding() {
        assert_eq!(seed_mode(Some(7)), SeedMode::Fixed(7));
        assert_eq!(seed_mode(None), SeedMode::Entropy);
    }

    #[test]
    fn subset_cli_defaults_match_documented_targets() {
        let cli = SampleSubsetCli::try_parse_from(["sample-subset"]).unwrap();
        assert_eq!(cli.single_turn, DEFAULT_SINGLE_TURN_TARGET);
        assert_eq!(cli.multi_turn, DEFAULT_MULTI_TURN_TARGET);
        assert_eq!(cli.seed, DEFAULT_SEED);
    }

    #[cfg(feature = "huggingface")]
    #[test]
    fn missing_token_is_a_credential_error() {
        // The env fallback may be set on developer machines; only assert the
        // explicit-argument path.
        let err = resolve_hub_token(Some("   ".to_string()));
        if std::env::var(TOKEN_ENV_VAR).is_err() {
            assert!(matches!(
                err,
                Err(PrepError::MissingCredential { .. })
            ));
        }
    }
}
