//! Structured error types for the activity engine.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("state: {path:?}: {source}")]
  State {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn state(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::State {
      path: path.into(),
      source,
    }
  }
}
