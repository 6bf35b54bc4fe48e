//! Engine configuration with sane defaults.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Tunables for classification, linking and aggregation.
///
/// Every field has a default, so a partial JSON object (or none at all) is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Project key prefixes recognised when scanning pull requests (e.g. "PROJ").
  pub key_prefixes: Vec<String>,
  /// Well-known team ID -> display name table.
  pub team_names: BTreeMap<String, String>,
  /// Statuses that count as finished (case-insensitive).
  pub done_statuses: Vec<String>,
  /// Max entries in a team's most-active list.
  pub most_active_limit: usize,
  /// Max entries in a team's recent-activity list.
  pub recent_activity_limit: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      key_prefixes: vec!["PROJ".into()],
      team_names: BTreeMap::new(),
      done_statuses: vec!["Done".into(), "Closed".into(), "Resolved".into()],
      most_active_limit: 5,
      recent_activity_limit: 10,
    }
  }
}

impl Config {
  pub fn is_done(&self, status: &str) -> bool {
    self
      .done_statuses
      .iter()
      .any(|s| s.eq_ignore_ascii_case(status.trim()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_json_keeps_defaults() {
    let config: Config = serde_json::from_str(r#"{"key_prefixes": ["OPS"]}"#).unwrap();
    assert_eq!(config.key_prefixes, vec!["OPS".to_string()]);
    assert_eq!(config.most_active_limit, 5);
    assert_eq!(config.recent_activity_limit, 10);
  }

  #[test]
  fn done_status_is_case_insensitive() {
    let config = Config::default();
    assert!(config.is_done("done"));
    assert!(config.is_done(" Closed "));
    assert!(!config.is_done("In Progress"));
  }
}
