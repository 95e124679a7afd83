//! Turn-table persistence.
//!
//! Tables are header-tagged CSV files with the canonical column order from
//! `constants::table::TURN_COLUMNS`. Message bodies are unbounded; the CSV
//! layer quotes and round-trips embedded commas, quotes, and newlines
//! without truncation.

use std::path::Path;

use crate::errors::PrepError;
use crate::turn::Turn;

/// Write a turn table, header included, in canonical column order.
pub fn write_turns(path: &Path, turns: &[Turn]) -> Result<(), PrepError> {
    let mut writer = csv::Writer::from_path(path).map_err(|err| PrepError::Table {
        path: path.to_path_buf(),
        reason: format!("failed creating writer: {err}"),
    })?;
    for turn in turns {
        writer.serialize(turn).map_err(|err| PrepError::Table {
            path: path.to_path_buf(),
            reason: format!("failed writing turn {}: {err}", turn.turn_id),
        })?;
    }
    writer.flush().map_err(|err| PrepError::Table {
        path: path.to_path_buf(),
        reason: format!("failed flushing: {err}"),
    })?;
    Ok(())
}

/// Read a full turn table into memory, preserving row order.
pub fn read_turns(path: &Path) -> Result<Vec<Turn>, PrepError> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| PrepError::Table {
        path: path.to_path_buf(),
        reason: format!("failed opening reader: {err}"),
    })?;
    let mut turns = Vec::new();
    for row in reader.deserialize() {
        let turn: Turn = row.map_err(|err| PrepError::Table {
            path: path.to_path_buf(),
            reason: format!("failed decoding row {}: {err}", turns.len() + 2),
        })?;
        turns.push(turn);
    }
    Ok(turns)
}
