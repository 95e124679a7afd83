use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::SourceId;

/// Error type for source access, table IO, and configuration failures.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("data source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },
    #[error("data source '{source_id}' returned inconsistent state: {details}")]
    SourceInconsistent {
        source_id: SourceId,
        details: String,
    },
    #[error(
        "dataset '{dataset}' is access-gated and no credential was found; \
         set {env_var} or pass a token argument"
    )]
    MissingCredential { dataset: String, env_var: String },
    #[error("turn table {path}: {reason}")]
    Table { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
}
