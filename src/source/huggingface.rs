//! Hub snapshot sources.
//!
//! Rows are served from local shard files (JSONL or Parquet) under a
//! snapshot directory. When the directory holds no shards, the remote
//! dataset's files for the configured split are downloaded up front through
//! `hf-hub` and materialized there — both flatteners consume every row
//! exactly once, so there is nothing to gain from lazy shard expansion.
//!
//! JSONL shards are indexed with byte-offset checkpoints so random access
//! seeks instead of rescanning; Parquet shards are indexed by row group.
//! Decoding happens one block (checkpoint span or row group) at a time,
//! with the most recent block kept decoded for the sequential scan.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::reader::RowIter;
use serde_json::{Map, Value};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{ChatRecord, ChatRecordSource, WideRecord, WideRecordSource};
use crate::constants::hub::{CHECKPOINT_STRIDE, DOWNLOAD_RETRIES, SHARD_EXTENSIONS};
use crate::errors::PrepError;
use crate::types::SourceId;

/// Configuration for a hub table backed by local snapshot shard files.
#[derive(Clone, Debug)]
pub struct HubTableConfig {
    /// Stable source id used in errors and progress events.
    pub source_id: SourceId,
    /// Hub dataset id, e.g. `allenai/wildchat-r1-p2-format-filtered`.
    pub dataset: String,
    /// Split name, e.g. `train`.
    pub split: String,
    /// Local path where shard files for this split are materialized.
    pub snapshot_dir: PathBuf,
    /// File extensions accepted as shard files.
    pub shard_extensions: Vec<String>,
    /// Number of rows between seek checkpoints while indexing a JSONL shard.
    pub checkpoint_stride: usize,
    /// Optional maximum row cap exposed by the source.
    pub max_rows: Option<usize>,
    /// Access token for gated datasets; `None` for public ones.
    pub token: Option<String>,
}

impl HubTableConfig {
    /// Create a config with required dataset identity values and local snapshot path.
    pub fn new(
        source_id: impl Into<SourceId>,
        dataset: impl Into<String>,
        split: impl Into<String>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            dataset: dataset.into(),
            split: split.into(),
            snapshot_dir: snapshot_dir.into(),
            shard_extensions: SHARD_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            checkpoint_stride: CHECKPOINT_STRIDE,
            max_rows: None,
            token: None,
        }
    }

    /// Attach an access token for a gated dataset.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Cap the number of rows exposed by the source.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    fn accepted_extensions(&self) -> Vec<String> {
        self.shard_extensions
            .iter()
            .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }
}

#[derive(Clone, Debug)]
struct ShardIndex {
    path: PathBuf,
    global_start: usize,
    row_count: usize,
    is_parquet: bool,
    /// `(local_start, row_count)` per Parquet row group.
    parquet_row_groups: Vec<(usize, usize)>,
    /// Byte offset of every `checkpoint_stride`-th row in a JSONL shard.
    checkpoints: Vec<u64>,
}

/// One decoded span of rows: a JSONL checkpoint block or a Parquet row group.
struct DecodedBlock {
    shard_pos: usize,
    block_start: usize,
    rows: Vec<Value>,
}

/// Row-oriented reader over the snapshot shards of one dataset split.
pub struct SnapshotRowSource {
    config: HubTableConfig,
    shards: Vec<ShardIndex>,
    total_rows: usize,
    block: Mutex<Option<DecodedBlock>>,
}

impl SnapshotRowSource {
    /// Open the source, downloading the split's shards when none exist locally.
    pub fn open(config: HubTableConfig) -> Result<Self, PrepError> {
        if config.checkpoint_stride == 0 {
            return Err(PrepError::Configuration(
                "hub source checkpoint_stride must be > 0".to_string(),
            ));
        }

        fs::create_dir_all(&config.snapshot_dir).map_err(|err| PrepError::SourceUnavailable {
            source_id: config.source_id.clone(),
            reason: format!(
                "failed creating snapshot_dir {}: {err}",
                config.snapshot_dir.display()
            ),
        })?;

        let mut shards = Self::index_local_shards(&config)?;
        if shards.is_empty() {
            Self::download_split(&config)?;
            shards = Self::index_local_shards(&config)?;
        }
        if shards.is_empty() {
            return Err(PrepError::SourceUnavailable {
                source_id: config.source_id.clone(),
                reason: format!(
                    "no shard files under {} with extensions {:?} after download",
                    config.snapshot_dir.display(),
                    config.shard_extensions
                ),
            });
        }

        let total_rows = shards
            .last()
            .map(|shard| shard.global_start + shard.row_count)
            .unwrap_or(0);
        info!(
            source = %config.source_id,
            rows = total_rows,
            shards = shards.len(),
            "hub source ready"
        );

        Ok(Self {
            config,
            shards,
            total_rows,
            block: Mutex::new(None),
        })
    }

    /// Stable source id.
    pub fn id(&self) -> &str {
        &self.config.source_id
    }

    /// Total rows exposed (after any `max_rows` cap).
    pub fn len(&self) -> usize {
        self.total_rows
    }

    /// True when the source exposes no rows.
    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }

    fn download_split(config: &HubTableConfig) -> Result<(), PrepError> {
        let api = ApiBuilder::new()
            .with_progress(true)
            .with_retries(DOWNLOAD_RETRIES)
            .with_token(config.token.clone())
            .build()
            .map_err(|err| PrepError::SourceUnavailable {
                source_id: config.source_id.clone(),
                reason: format!("failed building hub client: {err}"),
            })?;
        let repo_api = api.repo(Repo::new(config.dataset.clone(), RepoType::Dataset));

        info!(dataset = %config.dataset, "reading remote file list");
        let repo_info = repo_api.info().map_err(|err| PrepError::SourceUnavailable {
            source_id: config.source_id.clone(),
            reason: format!("failed reading hub repository info: {err}"),
        })?;

        let accepted = config.accepted_extensions();
        let mut candidates: Vec<String> = repo_info
            .siblings
            .into_iter()
            .map(|sibling| sibling.rfilename)
            .filter(|remote_path| Self::matches_split(remote_path, &config.split))
            .filter(|remote_path| {
                Path::new(remote_path)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| accepted.contains(&ext.to_ascii_lowercase()))
            })
            .collect();
        candidates.sort();

        if candidates.is_empty() {
            return Err(PrepError::SourceUnavailable {
                source_id: config.source_id.clone(),
                reason: format!(
                    "no remote shard files for dataset '{}' split '{}' with extensions {:?}",
                    config.dataset, config.split, config.shard_extensions
                ),
            });
        }

        for (ordinal, remote_path) in candidates.iter().enumerate() {
            info!(
                shard = ordinal + 1,
                total = candidates.len(),
                path = %remote_path,
                "downloading shard"
            );
            let cached = repo_api
                .get(remote_path)
                .map_err(|err| PrepError::SourceUnavailable {
                    source_id: config.source_id.clone(),
                    reason: format!("failed downloading '{remote_path}' from hub: {err}"),
                })?;
            Self::materialize(config, &cached, &config.snapshot_dir.join(remote_path))?;
        }
        Ok(())
    }

    /// Split membership test on remote paths: a `split/` directory segment,
    /// a `-split-` token, or a `split-` file-name prefix.
    fn matches_split(remote_path: &str, split: &str) -> bool {
        if split.is_empty() {
            return true;
        }
        let dir_tag = format!("{split}/");
        let token = format!("-{split}-");
        let prefix = format!("{split}-");
        remote_path.contains(&dir_tag)
            || remote_path.contains(&token)
            || Path::new(remote_path)
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
    }

    fn materialize(
        config: &HubTableConfig,
        cached: &Path,
        target: &Path,
    ) -> Result<(), PrepError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| PrepError::SourceUnavailable {
                source_id: config.source_id.clone(),
                reason: format!("failed creating snapshot subdir {}: {err}", parent.display()),
            })?;
        }
        if target.exists() {
            return Ok(());
        }
        let resolved = fs::canonicalize(cached).unwrap_or_else(|_| cached.to_path_buf());
        fs::copy(&resolved, target).map_err(|err| PrepError::SourceUnavailable {
            source_id: config.source_id.clone(),
            reason: format!(
                "failed copying cached shard {} -> {}: {err}",
                resolved.display(),
                target.display()
            ),
        })?;
        Ok(())
    }

    fn index_local_shards(config: &HubTableConfig) -> Result<Vec<ShardIndex>, PrepError> {
        let accepted = config.accepted_extensions();
        let mut shard_paths = Vec::new();
        for entry in WalkDir::new(&config.snapshot_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            if accepted.contains(&ext.to_ascii_lowercase()) {
                shard_paths.push(entry.path().to_path_buf());
            }
        }
        shard_paths.sort();

        let mut shards = Vec::new();
        let mut running_total = 0usize;
        for path in shard_paths {
            if config
                .max_rows
                .is_some_and(|max_rows| running_total >= max_rows)
            {
                break;
            }
            info!(source = %config.source_id, shard = %path.display(), "indexing shard");

            let remaining = config
                .max_rows
                .map(|max_rows| max_rows - running_total)
                .unwrap_or(usize::MAX);
            let Some(mut shard) = Self::index_shard(config, &path, remaining)? else {
                continue;
            };
            shard.global_start = running_total;
            running_total += shard.row_count;
            shards.push(shard);
        }
        Ok(shards)
    }

    fn index_shard(
        config: &HubTableConfig,
        path: &Path,
        row_cap: usize,
    ) -> Result<Option<ShardIndex>, PrepError> {
        let is_parquet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));

        let (rows, parquet_row_groups, checkpoints) = if is_parquet {
            let (rows, groups) = Self::parquet_row_group_map(config, path, row_cap)?;
            (rows, groups, Vec::new())
        } else {
            let file = File::open(path).map_err(|err| PrepError::SourceUnavailable {
                source_id: config.source_id.clone(),
                reason: format!("failed opening shard {}: {err}", path.display()),
            })?;
            let mut reader = BufReader::new(file);
            let mut checkpoints = Vec::new();
            let mut line = String::new();
            let mut offset = 0u64;
            let mut rows = 0usize;
            while rows < row_cap {
                if rows % config.checkpoint_stride == 0 {
                    checkpoints.push(offset);
                }
                line.clear();
                let bytes =
                    reader
                        .read_line(&mut line)
                        .map_err(|err| PrepError::SourceUnavailable {
                            source_id: config.source_id.clone(),
                            reason: format!("failed reading shard {}: {err}", path.display()),
                        })?;
                if bytes == 0 {
                    break;
                }
                rows += 1;
                offset = offset.saturating_add(bytes as u64);
            }
            (rows, Vec::new(), checkpoints)
        };

        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(ShardIndex {
            path: path.to_path_buf(),
            global_start: 0,
            row_count: rows,
            is_parquet,
            parquet_row_groups,
            checkpoints,
        }))
    }

    fn parquet_row_group_map(
        config: &HubTableConfig,
        path: &Path,
        row_cap: usize,
    ) -> Result<(usize, Vec<(usize, usize)>), PrepError> {
        let reader = Self::open_parquet(config, path)?;
        let mut groups = Vec::new();
        let mut running = 0usize;
        for meta in reader.metadata().row_groups() {
            if running >= row_cap {
                break;
            }
            let group_rows =
                usize::try_from(meta.num_rows()).map_err(|_| PrepError::SourceUnavailable {
                    source_id: config.source_id.clone(),
                    reason: format!("parquet row group size overflow in {}", path.display()),
                })?;
            if group_rows == 0 {
                continue;
            }
            let capped = group_rows.min(row_cap - running);
            groups.push((running, capped));
            running += capped;
        }
        Ok((running, groups))
    }

    fn open_parquet(
        config: &HubTableConfig,
        path: &Path,
    ) -> Result<SerializedFileReader<File>, PrepError> {
        let file = File::open(path).map_err(|err| PrepError::SourceUnavailable {
            source_id: config.source_id.clone(),
            reason: format!("failed opening parquet shard {}: {err}", path.display()),
        })?;
        SerializedFileReader::new(file).map_err(|err| PrepError::SourceUnavailable {
            source_id: config.source_id.clone(),
            reason: format!("failed reading parquet shard {}: {err}", path.display()),
        })
    }

    fn locate_shard(&self, idx: usize) -> Option<(usize, usize)> {
        let pos = self
            .shards
            .binary_search_by(|shard| {
                if idx < shard.global_start {
                    Ordering::Greater
                } else if idx >= shard.global_start + shard.row_count {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()?;
        Some((pos, idx - self.shards[pos].global_start))
    }

    /// Read one row as a JSON object, decoding its block on a cache miss.
    pub fn row_object(&self, idx: usize) -> Result<Option<Map<String, Value>>, PrepError> {
        if idx >= self.total_rows {
            return Ok(None);
        }
        let (shard_pos, local_idx) = self.locate_shard(idx).ok_or_else(|| {
            PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: format!("row index {idx} not covered by shard index"),
            }
        })?;

        let value = self.block_row(shard_pos, local_idx)?;
        // Some snapshot formats nest the payload under a `row` key.
        let payload = value.get("row").unwrap_or(&value);
        let object = payload
            .as_object()
            .cloned()
            .ok_or_else(|| PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: format!("row {idx} is not a JSON object"),
            })?;
        Ok(Some(object))
    }

    fn block_row(&self, shard_pos: usize, local_idx: usize) -> Result<Value, PrepError> {
        let shard = &self.shards[shard_pos];
        let (block_start, block_len) = if shard.is_parquet {
            self.parquet_group_bounds(shard, local_idx)?
        } else {
            let start = local_idx / self.config.checkpoint_stride * self.config.checkpoint_stride;
            let len = self.config.checkpoint_stride.min(shard.row_count - start);
            (start, len)
        };

        let mut cache = self
            .block
            .lock()
            .map_err(|_| PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: "hub source block cache lock poisoned".to_string(),
            })?;
        let cached_hit = cache
            .as_ref()
            .is_some_and(|block| block.shard_pos == shard_pos && block.block_start == block_start);
        if !cached_hit {
            let rows = if shard.is_parquet {
                self.decode_parquet_block(shard, block_start, block_len)?
            } else {
                self.decode_jsonl_block(shard, block_start, block_len)?
            };
            *cache = Some(DecodedBlock {
                shard_pos,
                block_start,
                rows,
            });
        }

        let block = cache.as_ref().expect("block cache populated above");
        block
            .rows
            .get(local_idx - block_start)
            .cloned()
            .ok_or_else(|| PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: format!(
                    "row {} missing from decoded block of shard {}",
                    local_idx,
                    shard.path.display()
                ),
            })
    }

    fn parquet_group_bounds(
        &self,
        shard: &ShardIndex,
        local_idx: usize,
    ) -> Result<(usize, usize), PrepError> {
        shard
            .parquet_row_groups
            .iter()
            .find(|(start, count)| local_idx >= *start && local_idx < start + count)
            .copied()
            .ok_or_else(|| PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: format!(
                    "parquet row {} not mapped to a row group in {}",
                    local_idx,
                    shard.path.display()
                ),
            })
    }

    fn decode_jsonl_block(
        &self,
        shard: &ShardIndex,
        block_start: usize,
        block_len: usize,
    ) -> Result<Vec<Value>, PrepError> {
        let checkpoint_idx = block_start / self.config.checkpoint_stride;
        let offset = *shard.checkpoints.get(checkpoint_idx).ok_or_else(|| {
            PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: format!(
                    "missing checkpoint {} for shard {}",
                    checkpoint_idx,
                    shard.path.display()
                ),
            }
        })?;

        let mut file = File::open(&shard.path).map_err(|err| PrepError::SourceUnavailable {
            source_id: self.config.source_id.clone(),
            reason: format!("failed opening shard {}: {err}", shard.path.display()),
        })?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|err| PrepError::SourceUnavailable {
                source_id: self.config.source_id.clone(),
                reason: format!("failed seeking shard {}: {err}", shard.path.display()),
            })?;

        let mut reader = BufReader::new(file);
        let mut rows = Vec::with_capacity(block_len);
        let mut line = String::new();
        for row_ordinal in 0..block_len {
            line.clear();
            let bytes =
                reader
                    .read_line(&mut line)
                    .map_err(|err| PrepError::SourceUnavailable {
                        source_id: self.config.source_id.clone(),
                        reason: format!("failed reading shard {}: {err}", shard.path.display()),
                    })?;
            if bytes == 0 {
                return Err(PrepError::SourceInconsistent {
                    source_id: self.config.source_id.clone(),
                    details: format!(
                        "unexpected EOF in shard {} at row {}",
                        shard.path.display(),
                        block_start + row_ordinal
                    ),
                });
            }
            let value = serde_json::from_str(line.trim()).map_err(|err| {
                PrepError::SourceInconsistent {
                    source_id: self.config.source_id.clone(),
                    details: format!(
                        "failed decoding JSON row {} in shard {}: {err}",
                        block_start + row_ordinal,
                        shard.path.display()
                    ),
                }
            })?;
            rows.push(value);
        }
        Ok(rows)
    }

    fn decode_parquet_block(
        &self,
        shard: &ShardIndex,
        block_start: usize,
        block_len: usize,
    ) -> Result<Vec<Value>, PrepError> {
        let group_pos = shard
            .parquet_row_groups
            .iter()
            .position(|(start, _)| *start == block_start)
            .ok_or_else(|| PrepError::SourceInconsistent {
                source_id: self.config.source_id.clone(),
                details: format!(
                    "no parquet row group starts at {} in {}",
                    block_start,
                    shard.path.display()
                ),
            })?;

        let reader = Self::open_parquet(&self.config, &shard.path)?;
        let row_group =
            reader
                .get_row_group(group_pos)
                .map_err(|err| PrepError::SourceUnavailable {
                    source_id: self.config.source_id.clone(),
                    reason: format!(
                        "failed opening parquet row group {} in {}: {err}",
                        group_pos,
                        shard.path.display()
                    ),
                })?;
        let iter = RowIter::from_row_group(None, row_group.as_ref()).map_err(|err| {
            PrepError::SourceUnavailable {
                source_id: self.config.source_id.clone(),
                reason: format!(
                    "failed iterating parquet row group {} in {}: {err}",
                    group_pos,
                    shard.path.display()
                ),
            }
        })?;

        let mut rows = Vec::with_capacity(block_len);
        for row in iter.take(block_len) {
            let row = row.map_err(|err| PrepError::SourceUnavailable {
                source_id: self.config.source_id.clone(),
                reason: format!(
                    "failed reading parquet row in {} row_group {}: {err}",
                    shard.path.display(),
                    group_pos
                ),
            })?;
            rows.push(row.to_json_value());
        }
        if rows.len() < block_len {
            warn!(
                source = %self.config.source_id,
                shard = %shard.path.display(),
                expected = block_len,
                decoded = rows.len(),
                "parquet row group decoded short"
            );
        }
        Ok(rows)
    }
}

/// Hub-backed message-list source.
pub struct HuggingFaceChatSource {
    rows: SnapshotRowSource,
}

impl HuggingFaceChatSource {
    /// Open the source, downloading the split's shards when needed.
    pub fn open(config: HubTableConfig) -> Result<Self, PrepError> {
        Ok(Self {
            rows: SnapshotRowSource::open(config)?,
        })
    }
}

impl ChatRecordSource for HuggingFaceChatSource {
    fn id(&self) -> &str {
        self.rows.id()
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn record_at(&self, idx: usize) -> Result<Option<ChatRecord>, PrepError> {
        Ok(self
            .rows
            .row_object(idx)?
            .map(|row| ChatRecord::from_row(&row)))
    }
}

/// Hub-backed wide-column source.
pub struct HuggingFaceWideSource {
    rows: SnapshotRowSource,
}

impl HuggingFaceWideSource {
    /// Open the source, downloading the split's shards when needed.
    pub fn open(config: HubTableConfig) -> Result<Self, PrepError> {
        Ok(Self {
            rows: SnapshotRowSource::open(config)?,
        })
    }
}

impl WideRecordSource for HuggingFaceWideSource {
    fn id(&self) -> &str {
        self.rows.id()
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn record_at(&self, idx: usize) -> Result<Option<WideRecord>, PrepError> {
        Ok(self
            .rows
            .row_object(idx)?
            .map(|row| WideRecord::from_row(&row)))
    }
}
