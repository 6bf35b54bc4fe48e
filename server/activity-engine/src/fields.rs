//! Logical attribute resolution over the raw, schema-inconsistent field map.
//!
//! The issue tracker stores the same attribute under different keys and in
//! different shapes (`{"value": ..}`, `{"name": ..}`, a list, a bare scalar).
//! All of that branching lives here and nowhere else.

use serde_json::{Map, Value};

use crate::types::WorkItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
  Team,
  TeamName,
  EpicLink,
  Initiative,
  StoryPoints,
  TargetPeriod,
}

impl LogicalField {
  /// Raw keys tried in order.
  pub fn candidates(self) -> &'static [&'static str] {
    match self {
      Self::Team => &["team", "Team", "customfield_10001", "customfield_10100"],
      Self::TeamName => &["teamName", "team_name"],
      Self::EpicLink => &["epicLink", "epic_link", "customfield_10014", "parent"],
      Self::Initiative => &["initiative", "workstream", "customfield_10200"],
      Self::StoryPoints => &[
        "storyPoints",
        "story_points",
        "customfield_10016",
        "customfield_10028",
      ],
      Self::TargetPeriod => &[
        "targetPeriod",
        "target_period",
        "sprint",
        "customfield_10020",
        "fixVersions",
      ],
    }
  }
}

/// Resolve a logical field on a work item. `None` means absent.
pub fn resolve(item: &WorkItem, field: LogicalField) -> Option<Value> {
  resolve_in(&item.fields, field)
}

/// Same as [`resolve`] but over a bare field map.
pub fn resolve_in(fields: &Map<String, Value>, field: LogicalField) -> Option<Value> {
  field
    .candidates()
    .iter()
    .filter_map(|key| fields.get(*key))
    .find_map(unwrap)
}

/// Resolve to a trimmed, non-empty string.
pub fn resolve_str(item: &WorkItem, field: LogicalField) -> Option<String> {
  resolve_str_in(&item.fields, field)
}

pub fn resolve_str_in(fields: &Map<String, Value>, field: LogicalField) -> Option<String> {
  resolve_in(fields, field).and_then(|v| value_to_string(&v))
}

/// Resolve to a number; numeric strings ("5", "2.5") are accepted.
pub fn resolve_f64_in(fields: &Map<String, Value>, field: LogicalField) -> Option<f64> {
  match resolve_in(fields, field)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

/// The single unwrap rule: `.value`, then `.name`, then `.key`, then first
/// list element, then any non-null scalar. The first of those properties
/// present on an object decides, even when it is null.
fn unwrap(raw: &Value) -> Option<Value> {
  match raw {
    Value::Null => None,
    Value::Object(obj) => ["value", "name", "key"]
      .iter()
      .find_map(|k| obj.get(*k))
      .filter(|v| !v.is_null())
      .cloned(),
    Value::Array(list) => list.first().and_then(unwrap),
    Value::String(s) if s.trim().is_empty() => None,
    scalar => Some(scalar.clone()),
  }
}

/// Render a resolved scalar as text. Objects and arrays yield `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => {
      let s = s.trim();
      (!s.is_empty()).then(|| s.to_string())
    }
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
