//! Last-successful-run watermark.
//!
//! The only mutable state the engine owns. The record is always read and
//! written whole; writes go through a sibling temp file and a rename so a
//! reader never sees a torn record.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::date::{self, DateRange};
use crate::error::EngineError;

/// On-disk shape: `{ "lastRunTimestamp": "...", "updatedAt": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_run_timestamp: Option<String>,
  pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct SyncStateStore {
  path: PathBuf,
}

impl SyncStateStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// `None` means "first run": the file is missing, unreadable or corrupt.
  pub fn last_run_timestamp(&self) -> Option<DateTime<Utc>> {
    let raw = match std::fs::read_to_string(&self.path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
      Err(e) => {
        tracing::warn!(path = %self.path.display(), error = %e, "watermark unreadable; treating as first run");
        return None;
      }
    };
    let state: SyncState = match serde_json::from_str(&raw) {
      Ok(s) => s,
      Err(e) => {
        tracing::warn!(path = %self.path.display(), error = %e, "watermark corrupt; treating as first run");
        return None;
      }
    };
    let ts = state.last_run_timestamp.as_deref().and_then(date::parse_timestamp);
    if ts.is_none() && state.last_run_timestamp.is_some() {
      tracing::warn!(path = %self.path.display(), "watermark timestamp unparseable; treating as first run");
    }
    ts
  }

  /// Replace the record atomically.
  pub fn save_last_run_timestamp(&self, ts: DateTime<Utc>) -> Result<(), EngineError> {
    let state = SyncState {
      last_run_timestamp: Some(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
      updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    let json = serde_json::to_vec_pretty(&state)?;

    let dir = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
      _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| EngineError::state(&dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| EngineError::state(&dir, e))?;
    tmp
      .write_all(&json)
      .and_then(|_| tmp.as_file().sync_all())
      .map_err(|e| EngineError::state(&self.path, e))?;
    tmp
      .persist(&self.path)
      .map_err(|e| EngineError::state(&self.path, e.error))?;

    tracing::debug!(path = %self.path.display(), last_run = %ts.to_rfc3339(), "watermark saved");
    Ok(())
  }
}

/// Narrow `requested` to start at the watermark when it falls inside it.
///
/// A watermark before the range or missing keeps the full range; one past
/// the end yields an empty window pinned at `end`.
pub fn incremental_range(requested: &DateRange, last_run: Option<DateTime<Utc>>) -> DateRange {
  match last_run {
    Some(ts) if ts > requested.start => DateRange {
      start: ts.min(requested.end),
      end: requested.end,
    },
    _ => *requested,
  }
}
