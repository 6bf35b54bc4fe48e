//! Turn raw change history into typed, severity-ranked change events.
//!
//! Only fields present in the classification table are meaningful; anything
//! else in a changelog is noise and is dropped.

use std::collections::BTreeMap;

use crate::date::DateRange;
use crate::types::*;

/// Fixed field -> category table. Matching is case-insensitive.
const FIELD_TABLE: &[(&str, FieldCategory)] = &[
  ("status", FieldCategory::Status),
  ("story points", FieldCategory::Points),
  ("story_points", FieldCategory::Points),
  ("storypoints", FieldCategory::Points),
  ("points", FieldCategory::Points),
  ("customfield_10016", FieldCategory::Points),
  ("priority", FieldCategory::Priority),
  ("assignee", FieldCategory::Assignee),
  ("team", FieldCategory::Team),
  ("customfield_10001", FieldCategory::Team),
  ("epic link", FieldCategory::EpicLink),
  ("epic_link", FieldCategory::EpicLink),
  ("parent", FieldCategory::EpicLink),
  ("customfield_10014", FieldCategory::EpicLink),
  ("comment", FieldCategory::Comment),
  ("summary", FieldCategory::Other),
  ("description", FieldCategory::Other),
  ("labels", FieldCategory::Other),
  ("sprint", FieldCategory::Other),
  ("fix version", FieldCategory::Other),
  ("duedate", FieldCategory::Other),
  ("resolution", FieldCategory::Other),
];

/// Look up a raw changelog field name.
pub fn categorize(field: &str) -> Option<FieldCategory> {
  let field = field.trim();
  FIELD_TABLE
    .iter()
    .find(|(name, _)| name.eq_ignore_ascii_case(field))
    .map(|(_, category)| *category)
}

/// Derive the change type purely from value presence.
pub fn change_type(from: Option<&str>, to: Option<&str>) -> ChangeType {
  let from = from.filter(|s| !s.trim().is_empty());
  let to = to.filter(|s| !s.trim().is_empty());
  match (from, to) {
    (Some(f), Some(t)) if f != t => ChangeType::Updated,
    (None, Some(_)) => ChangeType::Added,
    (Some(_), None) => ChangeType::Removed,
    _ => ChangeType::Modified,
  }
}

/// All classified events of `item` inside `range` (inclusive), oldest first.
pub fn classify(item: &WorkItem, range: &DateRange) -> Vec<ChangeEvent> {
  let mut events: Vec<ChangeEvent> = item
    .history
    .iter()
    .filter(|entry| range.contains(&entry.timestamp))
    .flat_map(|entry| {
      entry.deltas.iter().filter_map(move |delta| {
        let category = categorize(&delta.field)?;
        Some(ChangeEvent {
          item_key: item.key.clone(),
          field: delta.field.clone(),
          category,
          severity: category.severity(),
          change_type: change_type(delta.from.as_deref(), delta.to.as_deref()),
          from: delta.from.clone(),
          to: delta.to.clone(),
          author: entry.author.clone(),
          timestamp: entry.timestamp,
        })
      })
    })
    .collect();

  // History is not guaranteed sorted; stable sort keeps delta order within an entry.
  events.sort_by_key(|e| e.timestamp);
  events
}

/// Human-readable one-liner for an event.
pub fn describe(event: &ChangeEvent) -> String {
  let quoted = |v: &Option<String>| format!("'{}'", v.as_deref().unwrap_or(""));
  match event.change_type {
    ChangeType::Updated => format!(
      "{}: changed from {} to {} by {}",
      event.field,
      quoted(&event.from),
      quoted(&event.to),
      event.author
    ),
    ChangeType::Added => format!("{}: set to {} by {}", event.field, quoted(&event.to), event.author),
    ChangeType::Removed => format!(
      "{}: cleared (was {}) by {}",
      event.field,
      quoted(&event.from),
      event.author
    ),
    ChangeType::Modified => format!("{}: modified by {}", event.field, event.author),
  }
}

/// `None` when no event qualifies.
pub fn change_summary(item: &WorkItem, range: &DateRange) -> Option<ChangeSummary> {
  let events = classify(item, range);
  if events.is_empty() {
    return None;
  }

  let count = |severity: Severity| events.iter().filter(|e| e.severity == severity).count();
  let mut by_category = BTreeMap::new();
  for event in &events {
    *by_category.entry(event.category).or_insert(0) += 1;
  }
  let description = events.iter().map(describe).collect::<Vec<_>>().join("; ");

  Some(ChangeSummary {
    item_key: item.key.clone(),
    total_changes: events.len(),
    high_priority_changes: count(Severity::High),
    medium_priority_changes: count(Severity::Medium),
    low_priority_changes: count(Severity::Low),
    by_category,
    description,
    events,
  })
}

/// Items with at least one event at or above `min`.
pub fn filter_by_min_severity<'a>(
  items: &'a [WorkItem],
  range: &DateRange,
  min: Severity,
) -> Vec<&'a WorkItem> {
  items
    .iter()
    .filter(|item| classify(item, range).iter().any(|e| e.severity >= min))
    .collect()
}
