//! Integration tests for the activity engine.

use activity_engine::aggregate::UNKNOWN_TEAM;
use activity_engine::classify;
use activity_engine::normalize::normalize_items;
use activity_engine::risk::{NO_MOVEMENT, OVERDUE};
use activity_engine::state::SyncStateStore;
use activity_engine::types::Severity;
use activity_engine::{Config, DateRange, Engine, ReportInput};
use chrono::{DateTime, TimeZone, Utc};

fn now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap()
}

fn engine() -> Engine {
  Engine::new(Config::default()).unwrap()
}

fn fixture_input() -> ReportInput {
  let json = r#"{
    "range": {"start": "2025-01-13", "end": "2025-01-19"},
    "now": "2025-01-20T09:00:00Z",
    "initiatives": [
      {"key": "PROJ-1000", "type": "Initiative", "status": "In Progress", "summary": "Checkout revamp",
       "updated": "2025-01-18T00:00:00Z", "targetPeriod": "2025-Q1"}
    ],
    "sub_initiatives": [
      {"key": "PROJ-100", "type": "Epic", "status": "In Progress", "summary": "Payment forms",
       "updated": "2025-01-18T00:00:00Z", "initiative": "PROJ-1000"},
      {"key": "PROJ-200", "type": "Epic", "status": "To Do", "summary": "Orphaned epic",
       "updated": "2025-01-18T00:00:00Z", "initiative": "PROJ-9999"}
    ],
    "items": [
      {"key": "PROJ-12", "type": "Story", "status": "In Progress", "priority": "High",
       "summary": "Card form validation", "assignee": "alice",
       "team": {"id": "10", "value": "Payments"}, "epicLink": "PROJ-100",
       "points": {"total": 5, "done": 0},
       "created": "2025-01-14T09:00:00Z", "updated": "2025-01-16T12:00:00Z",
       "history": [
         {"author": "alice", "timestamp": "2025-01-15T10:00:00Z",
          "deltas": [{"field": "status", "from": "To Do", "to": "In Progress"}]},
         {"author": "bob", "timestamp": "2025-01-16T12:00:00Z",
          "deltas": [{"field": "Story Points", "from": 3, "to": 5}, {"field": "Rank", "from": "a", "to": "b"}]},
         {"author": "carol", "timestamp": "2025-01-02T12:00:00Z",
          "deltas": [{"field": "priority", "from": "Low", "to": "High"}]}
       ]},
      {"key": "PROJ-34", "type": "Bug", "status": "To Do", "priority": "Medium",
       "summary": "Refund rounding", "customfield_10001": [{"name": "Payments"}],
       "epicLink": "PROJ-100", "storyPoints": 3,
       "created": "2024-12-01T09:00:00Z", "updated": "2024-12-20T09:00:00Z", "dueDate": "2025-01-10"},
      {"key": "PROJ-56", "type": "Task", "status": "Done", "priority": "Low",
       "summary": "Docs", "customfield_10016": 2,
       "created": "2024-12-01T09:00:00Z", "updated": "2025-01-17T09:00:00Z",
       "history": [
         {"author": "dave", "timestamp": "2025-01-17T09:00:00Z",
          "deltas": [{"field": "status", "from": "In Progress", "to": "Done"}]}
       ]},
      {"type": "Story", "summary": "keyless record"}
    ],
    "pull_requests": [
      {"id": 501, "title": "Fix PROJ-12 and PROJ-34", "branchName": "feature/PROJ-12-fix", "author": "alice",
       "mergedAt": "2025-01-16T15:00:00Z"},
      {"id": "502", "title": "Chore: bump deps", "body": "no ticket"},
      {"id": "503", "title": "Follow-up", "commits": [{"sha": "abc", "message": "proj-12: tidy"}]}
    ]
  }"#;
  serde_json::from_str(json).unwrap()
}

#[test]
fn full_report_from_fixture() {
  let out = engine().run(&fixture_input(), now()).unwrap();

  // Team grouping: two Payments items (object and list shapes), one unknown.
  assert_eq!(out.teams.totals.total_issues, 3);
  let teams: Vec<&str> = out.teams.teams.iter().map(|t| t.team.as_str()).collect();
  assert_eq!(teams, vec!["Payments", UNKNOWN_TEAM]);

  let payments = &out.teams.teams[0];
  assert_eq!(payments.total_issues, 2);
  assert_eq!(payments.new_issues, 1);
  assert_eq!(payments.issues_with_changes, 1);
  assert_eq!(payments.total_changes, 2);
  assert_eq!(payments.most_active_issues[0].key, "PROJ-12");
  assert_eq!(payments.most_active_issues[0].high_priority_changes, 2);
  assert_eq!(
    payments.insights,
    vec![
      "Low activity level: 2 changes across 1 issues",
      "1 new issues created this period",
      "1 status transitions",
      "1 story point adjustments",
    ]
  );

  // Keyless record is reported, not fatal.
  assert_eq!(out.diagnostics.len(), 1);
  assert_eq!(out.diagnostics[0].field, "key");
}

#[test]
fn hierarchy_and_risk_from_fixture() {
  let out = engine().run(&fixture_input(), now()).unwrap();
  let h = &out.hierarchy;

  let epic = &h.sub_initiatives["PROJ-100"];
  assert_eq!(epic.total_points, 8.0);
  assert_eq!(epic.completed_points, 0.0);
  assert_eq!(epic.completion_rate, 0.0);
  assert_eq!(epic.risk_factors, vec![OVERDUE.to_string(), NO_MOVEMENT.to_string()]);

  let initiative = &h.initiatives["PROJ-1000"];
  assert_eq!(initiative.sub_initiative_keys, vec!["PROJ-100"]);
  assert_eq!(initiative.target_period.as_deref(), Some("2025-Q1"));
  assert_eq!(initiative.total_points, 8.0);

  assert_eq!(h.orphan_sub_initiatives, vec!["PROJ-200"]);
  assert_eq!(h.unassigned_sub_initiative.item_keys, vec!["PROJ-56"]);
  assert_eq!(h.unassigned_sub_initiative.total_points, 2.0);
  assert_eq!(h.unassigned_sub_initiative.completed_points, 2.0);

  // 1/3 items risky, 1/2 subs risky, 1/1 initiatives risky.
  let expected: f64 = 1.0 / 3.0 + 0.3 * 0.5 + 0.2;
  assert!((out.hierarchy_risk.score - (expected * 1000.0).round() / 1000.0).abs() < 1e-9);
}

#[test]
fn pull_requests_link_to_items() {
  let out = engine().run(&fixture_input(), now()).unwrap();
  let links = &out.links;

  assert_eq!(links.pr_keys["501"], vec!["PROJ-12", "PROJ-34"]);
  assert!(links.pr_keys["502"].is_empty());

  let proj12 = links.items.iter().find(|l| l.key == "PROJ-12").unwrap();
  let ids: Vec<&str> = proj12.pull_requests.iter().map(|p| p.id.as_str()).collect();
  assert_eq!(ids, vec!["501", "503"]);

  let proj56 = links.items.iter().find(|l| l.key == "PROJ-56").unwrap();
  assert!(proj56.pull_requests.is_empty());
  assert!(links.unmatched_keys.is_empty());
}

#[test]
fn narrative_and_structured_agree() {
  let out = engine().run(&fixture_input(), now()).unwrap();
  for team in &out.teams.teams {
    assert!(out.narrative.contains(&format!("## Team: {}", team.team)));
    assert!(out
      .narrative
      .contains(&format!("- Total changes: {}", team.total_changes)));
  }
}

#[test]
fn deterministic_output_across_runs() {
  let input = fixture_input();
  let a = serde_json::to_string(&engine().run(&input, now()).unwrap()).unwrap();
  let b = serde_json::to_string(&engine().run(&input, now()).unwrap()).unwrap();
  assert_eq!(a, b, "Same inputs must produce identical JSON output");
}

#[test]
fn change_summary_scenario() {
  let raw = fixture_input().items;
  let items = normalize_items(&raw, &Config::default()).items;
  let range = DateRange::parse("2025-01-13", "2025-01-19").unwrap();

  let summary = classify::change_summary(&items[0], &range).unwrap();
  assert_eq!(summary.total_changes, 2);
  assert_eq!(summary.high_priority_changes, 2);
  assert!(summary.description.contains("status"));
  assert!(summary.description.contains("Story Points"));
  assert!(!summary.description.contains("carol"));

  let high = classify::filter_by_min_severity(&items, &range, Severity::High);
  let keys: Vec<&str> = high.iter().map(|i| i.key.as_str()).collect();
  assert_eq!(keys, vec!["PROJ-12", "PROJ-56"]);
}

#[test]
fn watermark_round_trip_through_engine() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sync").join("state.json");
  let store = SyncStateStore::new(&path);
  assert_eq!(store.last_run_timestamp(), None);

  let mut input = fixture_input();
  input.state_file = Some(path.to_string_lossy().into_owned());
  let out = engine().run(&input, now()).unwrap();
  assert!(out.warnings.is_empty());
  assert_eq!(store.last_run_timestamp(), Some(now()));
}

#[test]
fn unknown_fields_are_ignored() {
  let json = r#"{
    "range": {"start": "2025-01-13T00:00:00Z", "end": "2025-01-19T23:59:59Z"},
    "items": [{"key": "PROJ-1", "some_unknown_field": {"nested": true}}],
    "pull_requests": [{"id": "9", "title": "x", "labels": ["a"]}],
    "another": 42
  }"#;
  let input: ReportInput = serde_json::from_str(json).unwrap();
  let out = engine().run(&input, now()).unwrap();
  assert_eq!(out.teams.teams[0].team, UNKNOWN_TEAM);
}

#[test]
fn invalid_range_gives_clear_error() {
  let json = r#"{"range": {"start": "2025-01-19", "end": "not a date"}}"#;
  let input: ReportInput = serde_json::from_str(json).unwrap();
  let err = engine().run(&input, now()).unwrap_err();
  assert!(
    err.to_string().contains("range.end"),
    "Error should mention the field: {}",
    err
  );
}
