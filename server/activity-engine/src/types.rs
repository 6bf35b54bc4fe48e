//! Core types for the activity engine (JSON contracts + internal models).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One inbound record. Anything that is not a JSON object lands in
/// `Malformed` so a single bad element cannot reject the whole payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Record<T> {
  Valid(T),
  Malformed(Value),
}

/// One work item as fetched from the issue tracker.
///
/// Attributes stay raw JSON until normalization so a wrong shape degrades to
/// a diagnostic. Schema-inconsistent attributes (team, epic link, story
/// points, ...) are kept verbatim in `fields` and resolved through
/// [`crate::fields`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundWorkItem {
  #[serde(default)]
  pub key: Option<Value>,
  #[serde(default, rename = "type")]
  pub issue_type: Option<Value>,
  #[serde(default)]
  pub status: Option<Value>,
  #[serde(default)]
  pub priority: Option<Value>,
  #[serde(default)]
  pub summary: Option<Value>,
  #[serde(default)]
  pub assignee: Option<Value>,
  #[serde(default)]
  pub created: Option<Value>,
  #[serde(default)]
  pub updated: Option<Value>,
  #[serde(default)]
  pub due_date: Option<Value>,
  /// `{"total": n, "done": n}`.
  #[serde(default)]
  pub points: Option<Value>,
  /// `[{"author", "timestamp", "deltas": [{"field", "from", "to"}]}]`.
  #[serde(default)]
  pub history: Option<Value>,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundPoints {
  #[serde(default)]
  pub total: Option<f64>,
  #[serde(default)]
  pub done: Option<f64>,
}

/// One pull request from the code-hosting platform. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub body: Option<String>,
  #[serde(default)]
  pub branch_name: Option<String>,
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub merged_at: Option<String>,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
  #[serde(default)]
  pub sha: String,
  #[serde(default)]
  pub message: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "expected string or number, got {}",
      other
    ))),
  }
}

/// One full report request, as read by the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportInput {
  pub range: InboundRange,
  /// Reference time for risk predicates; defaults to the wall clock.
  #[serde(default)]
  pub now: Option<String>,
  #[serde(default)]
  pub items: Vec<Record<InboundWorkItem>>,
  #[serde(default)]
  pub initiatives: Vec<Record<InboundWorkItem>>,
  #[serde(default)]
  pub sub_initiatives: Vec<Record<InboundWorkItem>>,
  #[serde(default)]
  pub pull_requests: Vec<Record<PullRequest>>,
  #[serde(default)]
  pub config: Option<Config>,
  /// Watermark file to update after a successful run.
  #[serde(default)]
  pub state_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundRange {
  pub start: String,
  pub end: String,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Points {
  pub total: f64,
  pub done: f64,
}

/// Canonical work item after normalization. Never mutated once built.
#[derive(Debug, Clone)]
pub struct WorkItem {
  pub key: String,
  pub issue_type: String,
  pub status: String,
  pub priority: String,
  pub summary: String,
  pub assignee: Option<String>,
  pub created: Option<DateTime<Utc>>,
  pub updated: Option<DateTime<Utc>>,
  pub due_date: Option<DateTime<Utc>>,
  pub points: Points,
  pub fields: Map<String, Value>,
  pub history: Vec<HistoryEntry>,
}

/// One changelog transaction.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
  pub author: String,
  pub timestamp: DateTime<Utc>,
  pub deltas: Vec<FieldDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDelta {
  pub field: String,
  pub from: Option<String>,
  pub to: Option<String>,
}

/// A record skipped or degraded during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub item_key: Option<String>,
  pub field: String,
  pub reason: String,
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
  Low,
  Medium,
  High,
}

/// Logical field category. Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
  Status,
  Assignee,
  Priority,
  Points,
  Team,
  EpicLink,
  Comment,
  Other,
}

impl FieldCategory {
  pub const ALL: [FieldCategory; 8] = [
    Self::Status,
    Self::Assignee,
    Self::Priority,
    Self::Points,
    Self::Team,
    Self::EpicLink,
    Self::Comment,
    Self::Other,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Self::Status => "status",
      Self::Assignee => "assignee",
      Self::Priority => "priority",
      Self::Points => "points",
      Self::Team => "team",
      Self::EpicLink => "epic_link",
      Self::Comment => "comment",
      Self::Other => "other",
    }
  }

  /// Fixed category -> severity tier.
  pub fn severity(self) -> Severity {
    match self {
      Self::Status | Self::Points => Severity::High,
      Self::Assignee | Self::Priority | Self::Team | Self::EpicLink => Severity::Medium,
      Self::Comment | Self::Other => Severity::Low,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
  Added,
  Removed,
  Updated,
  Modified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
  pub item_key: String,
  pub field: String,
  pub category: FieldCategory,
  pub severity: Severity,
  pub change_type: ChangeType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub from: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to: Option<String>,
  pub author: String,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSummary {
  pub item_key: String,
  pub total_changes: usize,
  pub high_priority_changes: usize,
  pub medium_priority_changes: usize,
  pub low_priority_changes: usize,
  pub by_category: BTreeMap<FieldCategory, usize>,
  pub description: String,
  pub events: Vec<ChangeEvent>,
}

// ---------------------------------------------------------------------------
// Hierarchy roll-up
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Initiative,
  SubInitiative,
}

/// Aggregated initiative or sub-initiative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupNode {
  pub key: String,
  pub kind: NodeKind,
  pub title: String,
  pub status: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target_period: Option<String>,
  pub risk_factors: Vec<String>,
  pub child_item_keys: Vec<String>,
  /// Only populated for initiatives.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub sub_initiative_keys: Vec<String>,
  pub item_count: usize,
  pub completed_item_count: usize,
  pub total_points: f64,
  pub completed_points: f64,
  pub completion_rate: f64,
}

/// Items that could not be attached to any node of one tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnassignedBucket {
  pub item_keys: Vec<String>,
  pub total_points: f64,
  pub completed_points: f64,
}

/// Per-item roll-up row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRollup {
  pub key: String,
  pub points: Points,
  pub done: bool,
  pub risk_factors: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sub_initiative: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub initiative: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hierarchy {
  pub initiatives: BTreeMap<String, RollupNode>,
  pub sub_initiatives: BTreeMap<String, RollupNode>,
  pub items: BTreeMap<String, ItemRollup>,
  /// Items with no resolvable sub-initiative.
  pub unassigned_sub_initiative: UnassignedBucket,
  /// Items with no resolvable initiative (directly or via their sub-initiative).
  pub unassigned_initiative: UnassignedBucket,
  /// Sub-initiatives whose declared parent did not resolve.
  pub orphan_sub_initiatives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyRisk {
  pub score: f64,
  pub total_items: usize,
  pub risky_items: usize,
  pub total_sub_initiatives: usize,
  pub risky_sub_initiatives: usize,
  pub total_initiatives: usize,
  pub risky_initiatives: usize,
  /// Deduplicated union of child item factors, keyed by node key.
  pub node_factors: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Cross-links
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
  pub id: String,
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub merged_at: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedItem {
  pub key: String,
  pub pull_requests: Vec<PullRequestRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
  pub items: Vec<LinkedItem>,
  /// PR id -> extracted keys, in first-appearance order.
  pub pr_keys: BTreeMap<String, Vec<String>>,
  /// Keys referenced by some PR that match no input item.
  pub unmatched_keys: Vec<String>,
  /// PR ids seen more than once; their key lists are merged in `pr_keys`.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub duplicate_pr_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Team summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveIssue {
  pub key: String,
  pub summary: String,
  pub status: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assignee: Option<String>,
  pub change_count: usize,
  pub high_priority_changes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentActivity {
  pub key: String,
  pub summary: String,
  pub last_change: DateTime<Utc>,
  pub last_author: String,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
  pub team: String,
  pub total_issues: usize,
  pub issues_with_changes: usize,
  pub new_issues: usize,
  pub total_changes: usize,
  pub change_breakdown: BTreeMap<FieldCategory, usize>,
  pub by_status: BTreeMap<String, usize>,
  pub by_type: BTreeMap<String, usize>,
  pub by_priority: BTreeMap<String, usize>,
  pub most_active_issues: Vec<ActiveIssue>,
  pub recent_activity: Vec<RecentActivity>,
  pub insights: Vec<String>,
}

impl TeamSummary {
  pub fn new(team: impl Into<String>) -> Self {
    Self {
      team: team.into(),
      total_issues: 0,
      issues_with_changes: 0,
      new_issues: 0,
      total_changes: 0,
      change_breakdown: BTreeMap::new(),
      by_status: BTreeMap::new(),
      by_type: BTreeMap::new(),
      by_priority: BTreeMap::new(),
      most_active_issues: Vec::new(),
      recent_activity: Vec::new(),
      insights: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPeriod {
  pub start: String,
  pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTotals {
  pub teams: usize,
  pub total_issues: usize,
  pub issues_with_changes: usize,
  pub new_issues: usize,
  pub total_changes: usize,
}

/// Machine-readable rendering of the team summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredReport {
  pub period: ReportPeriod,
  pub totals: ReportTotals,
  pub teams: Vec<TeamSummary>,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
  pub report_id: String,
  pub period: ReportPeriod,
  pub generated_at: String,
  pub teams: StructuredReport,
  pub narrative: String,
  pub hierarchy: Hierarchy,
  pub hierarchy_risk: HierarchyRisk,
  pub links: LinkReport,
  /// Watermark found before this run, when a state file was given.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub previous_run: Option<String>,
  /// Range start narrowed to the previous watermark; only changes after it
  /// need refetching.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub incremental_start: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub diagnostics: Vec<Diagnostic>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
}

/// Structured error output for fatal input problems.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
