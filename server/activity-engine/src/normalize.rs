//! Normalize inbound work items into canonical internal models.
//!
//! Dirty records degrade instead of failing the batch: an item without a key
//! is dropped, a history entry with an unparseable timestamp is dropped, an
//! unparseable or wrongly shaped attribute becomes `None`, a delta without a
//! field name is dropped. Each degradation leaves a [`Diagnostic`] behind.

use serde_json::Value;

use crate::config::Config;
use crate::date;
use crate::fields::{self, LogicalField};
use crate::types::*;

/// Normalized batch plus everything skipped along the way.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
  pub items: Vec<WorkItem>,
  pub diagnostics: Vec<Diagnostic>,
}

pub fn normalize_items(raw: &[Record<InboundWorkItem>], config: &Config) -> Normalized {
  let mut out = Normalized::default();
  for (index, record) in raw.iter().enumerate() {
    let item = match record {
      Record::Valid(item) => item,
      Record::Malformed(v) => {
        report(
          &mut out.diagnostics,
          None,
          "item",
          &format!("item #{} is {}, not an object; skipped", index, kind(v)),
        );
        continue;
      }
    };
    if let Some(item) = normalize_item(item, index, config, &mut out.diagnostics) {
      out.items.push(item);
    }
  }
  out
}

/// Keep well-formed pull requests; malformed ones are skipped with a diagnostic.
pub fn normalize_pull_requests(raw: &[Record<PullRequest>]) -> (Vec<PullRequest>, Vec<Diagnostic>) {
  let mut prs = Vec::with_capacity(raw.len());
  let mut diagnostics = Vec::new();
  for (index, record) in raw.iter().enumerate() {
    match record {
      Record::Valid(pr) => prs.push(pr.clone()),
      Record::Malformed(_) => report(
        &mut diagnostics,
        None,
        &format!("pull_requests[{}]", index),
        "not a valid pull request; skipped",
      ),
    }
  }
  (prs, diagnostics)
}

fn normalize_item(
  raw: &InboundWorkItem,
  index: usize,
  config: &Config,
  diagnostics: &mut Vec<Diagnostic>,
) -> Option<WorkItem> {
  let key = match scalar(raw.key.as_ref()) {
    Ok(Some(k)) => k,
    _ => {
      report(diagnostics, None, "key", &format!("item #{} has no key; skipped", index));
      return None;
    }
  };

  let created = parse_optional(&key, "created", raw.created.as_ref(), false, diagnostics);
  let updated = parse_optional(&key, "updated", raw.updated.as_ref(), false, diagnostics);
  let due_date = parse_optional(&key, "dueDate", raw.due_date.as_ref(), true, diagnostics);

  let status = attr(&key, "status", raw.status.as_ref(), diagnostics).unwrap_or_else(|| "Unknown".into());
  let points = resolve_points(&key, raw, &status, config, diagnostics);
  let history = normalize_history(&key, raw.history.as_ref(), diagnostics);

  Some(WorkItem {
    issue_type: attr(&key, "type", raw.issue_type.as_ref(), diagnostics).unwrap_or_else(|| "Unknown".into()),
    status,
    priority: attr(&key, "priority", raw.priority.as_ref(), diagnostics).unwrap_or_else(|| "None".into()),
    summary: attr(&key, "summary", raw.summary.as_ref(), diagnostics).unwrap_or_default(),
    assignee: attr(&key, "assignee", raw.assignee.as_ref(), diagnostics),
    created,
    updated,
    due_date,
    points,
    fields: raw.fields.clone(),
    history,
    key,
  })
}

fn normalize_history(key: &str, raw: Option<&Value>, diagnostics: &mut Vec<Diagnostic>) -> Vec<HistoryEntry> {
  let entries = match raw {
    None | Some(Value::Null) => return Vec::new(),
    Some(Value::Array(entries)) => entries,
    Some(other) => {
      report(diagnostics, Some(key), "history", &format!("expected a list, got {}; ignored", kind(other)));
      return Vec::new();
    }
  };

  let mut history = Vec::with_capacity(entries.len());
  for (i, entry) in entries.iter().enumerate() {
    let Value::Object(entry) = entry else {
      report(diagnostics, Some(key), &format!("history[{}]", i), "not an object; entry skipped");
      continue;
    };
    let Some(ts) = entry.get("timestamp").and_then(Value::as_str).and_then(date::parse_timestamp) else {
      report(
        diagnostics,
        Some(key),
        &format!("history[{}].timestamp", i),
        "missing or invalid RFC3339; entry skipped",
      );
      continue;
    };
    history.push(HistoryEntry {
      author: scalar(entry.get("author")).ok().flatten().unwrap_or_else(|| "unknown".into()),
      timestamp: ts,
      deltas: normalize_deltas(key, i, entry.get("deltas"), diagnostics),
    });
  }
  history
}

fn normalize_deltas(
  key: &str,
  entry: usize,
  raw: Option<&Value>,
  diagnostics: &mut Vec<Diagnostic>,
) -> Vec<FieldDelta> {
  let deltas = match raw {
    None | Some(Value::Null) => return Vec::new(),
    Some(Value::Array(deltas)) => deltas,
    Some(other) => {
      report(
        diagnostics,
        Some(key),
        &format!("history[{}].deltas", entry),
        &format!("expected a list, got {}; ignored", kind(other)),
      );
      return Vec::new();
    }
  };

  let mut out = Vec::with_capacity(deltas.len());
  for (j, delta) in deltas.iter().enumerate() {
    let field = delta
      .get("field")
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|f| !f.is_empty());
    let Some(field) = field else {
      report(
        diagnostics,
        Some(key),
        &format!("history[{}].deltas[{}].field", entry, j),
        "missing field name; delta skipped",
      );
      continue;
    };
    out.push(FieldDelta {
      field: field.to_string(),
      from: delta.get("from").and_then(delta_value),
      to: delta.get("to").and_then(delta_value),
    });
  }
  out
}

/// Explicit `points` wins. Otherwise story points count as the total, and as
/// done only when the item itself is finished.
fn resolve_points(
  key: &str,
  raw: &InboundWorkItem,
  status: &str,
  config: &Config,
  diagnostics: &mut Vec<Diagnostic>,
) -> Points {
  if let Some(v) = raw.points.as_ref().filter(|v| !v.is_null()) {
    match serde_json::from_value::<InboundPoints>(v.clone()) {
      Ok(p) => {
        let total = p.total.unwrap_or(0.0).max(0.0);
        let done = p.done.unwrap_or(0.0).max(0.0);
        return Points { total, done };
      }
      Err(e) => report(diagnostics, Some(key), "points", &format!("{}; using story points", e)),
    }
  }
  let total = fields::resolve_f64_in(&raw.fields, LogicalField::StoryPoints)
    .unwrap_or(0.0)
    .max(0.0);
  let done = if config.is_done(status) { total } else { 0.0 };
  Points { total, done }
}

fn parse_optional(
  key: &str,
  field: &str,
  raw: Option<&Value>,
  end_of_day: bool,
  diagnostics: &mut Vec<Diagnostic>,
) -> Option<chrono::DateTime<chrono::Utc>> {
  let raw = attr(key, field, raw, diagnostics)?;
  let parsed = date::parse_bound(&raw, end_of_day);
  if parsed.is_none() {
    report(diagnostics, Some(key), field, &format!("unparseable timestamp {:?}", raw));
  }
  parsed
}

/// Trimmed text for a scalar; `Err` names the shape when it is not one.
fn scalar(v: Option<&Value>) -> Result<Option<String>, &'static str> {
  match v {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(non_empty(Some(s.as_str()))),
    Some(Value::Number(n)) => Ok(Some(n.to_string())),
    Some(Value::Bool(b)) => Ok(Some(b.to_string())),
    Some(other) => Err(kind(other)),
  }
}

/// Like [`scalar`], but a wrong shape is recorded and read as absent.
fn attr(key: &str, field: &str, v: Option<&Value>, diagnostics: &mut Vec<Diagnostic>) -> Option<String> {
  match scalar(v) {
    Ok(s) => s,
    Err(shape) => {
      report(diagnostics, Some(key), field, &format!("expected a scalar, got {}; ignored", shape));
      None
    }
  }
}

fn kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a list",
    Value::Object(_) => "an object",
  }
}

fn delta_value(v: &Value) -> Option<String> {
  match v {
    Value::Null => None,
    Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    other => fields::value_to_string(other),
  }
}

fn non_empty(s: Option<&str>) -> Option<String> {
  s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn report(diagnostics: &mut Vec<Diagnostic>, key: Option<&str>, field: &str, reason: &str) {
  tracing::warn!(item = key.unwrap_or("-"), field, reason, "degraded input record");
  diagnostics.push(Diagnostic {
    item_key: key.map(str::to_string),
    field: field.to_string(),
    reason: reason.to_string(),
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(json: &str) -> Record<InboundWorkItem> {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn item_without_key_is_skipped_with_diagnostic() {
    let raw = vec![parse(r#"{"status": "Done"}"#), parse(r#"{"key": "PROJ-1"}"#)];
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].key, "PROJ-1");
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].field, "key");
  }

  #[test]
  fn bad_history_timestamp_drops_only_that_entry() {
    let raw = vec![parse(
      r#"{
        "key": "PROJ-2",
        "history": [
          {"author": "a", "timestamp": "yesterday", "deltas": [{"field": "status", "from": "A", "to": "B"}]},
          {"author": "b", "timestamp": "2025-01-15T10:00:00Z", "deltas": [{"field": "status", "from": "B", "to": "C"}]}
        ]
      }"#,
    )];
    let out = normalize_items(&raw, &Config::default());
    let item = &out.items[0];
    assert_eq!(item.history.len(), 1);
    assert_eq!(item.history[0].author, "b");
    assert_eq!(out.diagnostics[0].item_key.as_deref(), Some("PROJ-2"));
    assert!(out.diagnostics[0].field.starts_with("history[0]"));
  }

  #[test]
  fn numeric_deltas_become_strings() {
    let raw = vec![parse(
      r#"{"key": "PROJ-3", "history": [{"author": "a", "timestamp": "2025-01-15T10:00:00Z",
        "deltas": [{"field": "Story Points", "from": 5, "to": 8}]}]}"#,
    )];
    let out = normalize_items(&raw, &Config::default());
    let delta = &out.items[0].history[0].deltas[0];
    assert_eq!(delta.from.as_deref(), Some("5"));
    assert_eq!(delta.to.as_deref(), Some("8"));
  }

  #[test]
  fn explicit_points_win_over_story_points() {
    let raw = vec![parse(r#"{"key": "PROJ-4", "points": {"total": 3, "done": 1}, "storyPoints": 13}"#)];
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items[0].points, Points { total: 3.0, done: 1.0 });
  }

  #[test]
  fn story_points_count_as_done_for_finished_items() {
    let raw = vec![
      parse(r#"{"key": "PROJ-5", "status": "Done", "customfield_10016": 5}"#),
      parse(r#"{"key": "PROJ-6", "status": "In Progress", "customfield_10016": 3}"#),
    ];
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items[0].points, Points { total: 5.0, done: 5.0 });
    assert_eq!(out.items[1].points, Points { total: 3.0, done: 0.0 });
  }

  #[test]
  fn date_only_due_date_is_end_of_day() {
    let raw = vec![parse(r#"{"key": "PROJ-7", "dueDate": "2025-01-15"}"#)];
    let out = normalize_items(&raw, &Config::default());
    let due = out.items[0].due_date.unwrap();
    assert_eq!(due.to_rfc3339(), "2025-01-15T23:59:59+00:00");
  }

  #[test]
  fn unparseable_created_degrades_to_none() {
    let raw = vec![parse(r#"{"key": "PROJ-8", "created": "soon"}"#)];
    let out = normalize_items(&raw, &Config::default());
    assert!(out.items[0].created.is_none());
    assert_eq!(out.diagnostics[0].field, "created");
  }

  #[test]
  fn delta_without_field_is_dropped_not_fatal() {
    let raw: Vec<Record<InboundWorkItem>> = serde_json::from_str(
      r#"[
        {"key": "PROJ-1", "status": "Done"},
        {"key": "PROJ-2", "history": [{"author": "a", "timestamp": "2025-01-15T10:00:00Z",
          "deltas": [{"from": "A", "to": "B"}, {"field": "status", "from": "A", "to": "B"}]}]}
      ]"#,
    )
    .unwrap();
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items.len(), 2);
    let deltas = &out.items[1].history[0].deltas;
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].field, "status");
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].field, "history[0].deltas[0].field");
  }

  #[test]
  fn wrongly_shaped_attributes_degrade() {
    let raw = vec![parse(
      r#"{"key": "PROJ-3", "status": ["In Progress"], "created": 12, "points": "lots",
        "storyPoints": 2, "history": [42, {"author": "b", "timestamp": 7}]}"#,
    )];
    let out = normalize_items(&raw, &Config::default());
    let item = &out.items[0];
    assert_eq!(item.status, "Unknown");
    assert!(item.created.is_none());
    assert_eq!(item.points, Points { total: 2.0, done: 0.0 });
    assert!(item.history.is_empty());
    let fields: Vec<&str> = out.diagnostics.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(
      fields,
      vec!["created", "status", "points", "history[0]", "history[1].timestamp"]
    );
  }

  #[test]
  fn non_object_record_is_skipped() {
    let raw: Vec<Record<InboundWorkItem>> =
      serde_json::from_str(r#"[42, "PROJ-9", {"key": "PROJ-1"}]"#).unwrap();
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.diagnostics.len(), 2);
    assert!(out.diagnostics.iter().all(|d| d.field == "item"));
  }

  #[test]
  fn numeric_key_is_accepted() {
    let raw = vec![parse(r#"{"key": 1234}"#)];
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items[0].key, "1234");
  }

  #[test]
  fn malformed_pull_request_is_skipped() {
    let raw: Vec<Record<PullRequest>> = serde_json::from_str(
      r#"[{"id": 1, "title": "PROJ-1"}, {"title": "no id"}, {"id": "3", "title": ["x"]}]"#,
    )
    .unwrap();
    let (prs, diagnostics) = normalize_pull_requests(&raw);
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].id, "1");
    let fields: Vec<&str> = diagnostics.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, vec!["pull_requests[1]", "pull_requests[2]"]);
  }

  #[test]
  fn unknown_attributes_land_in_fields() {
    let raw = vec![parse(r#"{"key": "PROJ-9", "type": "Bug", "team": {"value": "Core"}}"#)];
    let out = normalize_items(&raw, &Config::default());
    assert_eq!(out.items[0].issue_type, "Bug");
    assert!(out.items[0].fields.contains_key("team"));
    assert!(!out.items[0].fields.contains_key("type"));
  }
}
