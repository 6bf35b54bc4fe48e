//! Per-team aggregation and the two report renderers.
//!
//! Both [`to_narrative`] and [`to_structured`] read the same summary map, so
//! the Markdown and JSON views cannot drift apart.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::classify;
use crate::config::Config;
use crate::date::DateRange;
use crate::fields::{self, LogicalField};
use crate::types::*;

pub const UNKNOWN_TEAM: &str = "Unknown Team";

const HIGH_ACTIVITY_THRESHOLD: usize = 20;
const MODERATE_ACTIVITY_THRESHOLD: usize = 10;

pub struct TeamAggregator {
  team_names: BTreeMap<String, String>,
  most_active_limit: usize,
  recent_activity_limit: usize,
}

impl TeamAggregator {
  pub fn new(config: &Config) -> Self {
    Self {
      team_names: config.team_names.clone(),
      most_active_limit: config.most_active_limit,
      recent_activity_limit: config.recent_activity_limit,
    }
  }

  /// Replace the team ID -> name table.
  pub fn with_team_names(mut self, team_names: BTreeMap<String, String>) -> Self {
    self.team_names = team_names;
    self
  }

  /// Display name for an item's team; never empty, never a known raw ID.
  pub fn team_of(&self, item: &WorkItem) -> String {
    let raw = fields::resolve_str(item, LogicalField::Team);
    if let Some(name) = raw.as_ref().and_then(|id| self.team_names.get(id)) {
      return name.clone();
    }
    fields::resolve_str(item, LogicalField::TeamName)
      .or(raw)
      .unwrap_or_else(|| UNKNOWN_TEAM.to_string())
  }

  pub fn aggregate(&self, items: &[WorkItem], range: &DateRange) -> BTreeMap<String, TeamSummary> {
    let mut teams: BTreeMap<String, TeamSummary> = BTreeMap::new();

    for item in items {
      let team = self.team_of(item);
      let summary = teams
        .entry(team.clone())
        .or_insert_with(|| TeamSummary::new(team));

      summary.total_issues += 1;
      if item.created.is_some_and(|c| range.contains(&c)) {
        summary.new_issues += 1;
      }
      *summary.by_status.entry(item.status.clone()).or_insert(0) += 1;
      *summary.by_type.entry(item.issue_type.clone()).or_insert(0) += 1;
      *summary.by_priority.entry(item.priority.clone()).or_insert(0) += 1;

      let Some(changes) = classify::change_summary(item, range) else {
        continue;
      };
      summary.issues_with_changes += 1;
      summary.total_changes += changes.total_changes;
      for (category, count) in &changes.by_category {
        *summary.change_breakdown.entry(*category).or_insert(0) += count;
      }

      summary.most_active_issues.push(ActiveIssue {
        key: item.key.clone(),
        summary: item.summary.clone(),
        status: item.status.clone(),
        assignee: item.assignee.clone(),
        change_count: changes.total_changes,
        high_priority_changes: changes.high_priority_changes,
      });
      if let Some(last) = changes.events.last() {
        summary.recent_activity.push(RecentActivity {
          key: item.key.clone(),
          summary: item.summary.clone(),
          last_change: last.timestamp,
          last_author: last.author.clone(),
          description: changes.description.clone(),
        });
      }
    }

    for summary in teams.values_mut() {
      summary
        .most_active_issues
        .sort_by(|a, b| b.change_count.cmp(&a.change_count).then_with(|| a.key.cmp(&b.key)));
      summary.most_active_issues.truncate(self.most_active_limit);

      summary
        .recent_activity
        .sort_by(|a, b| b.last_change.cmp(&a.last_change).then_with(|| a.key.cmp(&b.key)));
      summary.recent_activity.truncate(self.recent_activity_limit);

      summary.insights = insights(summary);
    }

    tracing::debug!(teams = teams.len(), items = items.len(), "team summaries aggregated");
    teams
  }
}

/// Ordered, fixed-template observations for one team.
pub fn insights(summary: &TeamSummary) -> Vec<String> {
  let mut out = Vec::new();
  let level = if summary.total_changes > HIGH_ACTIVITY_THRESHOLD {
    "High"
  } else if summary.total_changes > MODERATE_ACTIVITY_THRESHOLD {
    "Moderate"
  } else {
    "Low"
  };
  out.push(format!(
    "{} activity level: {} changes across {} issues",
    level, summary.total_changes, summary.issues_with_changes
  ));

  if summary.new_issues > 0 {
    out.push(format!("{} new issues created this period", summary.new_issues));
  }

  for category in FieldCategory::ALL {
    let n = summary.change_breakdown.get(&category).copied().unwrap_or(0);
    if n == 0 {
      continue;
    }
    let line = match category {
      FieldCategory::Status => format!("{} status transitions", n),
      FieldCategory::Assignee => format!("{} assignee changes", n),
      FieldCategory::Priority => format!("{} priority changes", n),
      FieldCategory::Points => format!("{} story point adjustments", n),
      FieldCategory::Team => format!("{} team reassignments", n),
      FieldCategory::EpicLink => format!("{} epic link changes", n),
      FieldCategory::Comment => format!("{} comments added", n),
      FieldCategory::Other => format!("{} other field updates", n),
    };
    out.push(line);
  }
  out
}

fn period(range: &DateRange) -> ReportPeriod {
  ReportPeriod {
    start: range.start.to_rfc3339(),
    end: range.end.to_rfc3339(),
  }
}

/// Machine-readable view of the summaries, teams in map order.
pub fn to_structured(summaries: &BTreeMap<String, TeamSummary>, range: &DateRange) -> StructuredReport {
  let teams: Vec<TeamSummary> = summaries.values().cloned().collect();
  let totals = ReportTotals {
    teams: teams.len(),
    total_issues: teams.iter().map(|t| t.total_issues).sum(),
    issues_with_changes: teams.iter().map(|t| t.issues_with_changes).sum(),
    new_issues: teams.iter().map(|t| t.new_issues).sum(),
    total_changes: teams.iter().map(|t| t.total_changes).sum(),
  };
  StructuredReport {
    period: period(range),
    totals,
    teams,
  }
}

fn fmt_time(ts: &DateTime<Utc>) -> String {
  ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Markdown report, one section per team in map order.
pub fn to_narrative(summaries: &BTreeMap<String, TeamSummary>, range: &DateRange) -> String {
  let mut out = String::new();
  // Writing into a String cannot fail.
  let _ = writeln!(out, "# Weekly Activity Report: {}", range.label());

  if summaries.is_empty() {
    let _ = writeln!(out, "\nNo activity recorded for this period.");
    return out;
  }

  for summary in summaries.values() {
    let _ = writeln!(out, "\n## Team: {}", summary.team);

    let _ = writeln!(out, "\n### Overview");
    let _ = writeln!(out, "- Total issues: {}", summary.total_issues);
    let _ = writeln!(out, "- Issues with changes: {}", summary.issues_with_changes);
    let _ = writeln!(out, "- New issues: {}", summary.new_issues);
    let _ = writeln!(out, "- Total changes: {}", summary.total_changes);

    let _ = writeln!(out, "\n### Key Insights");
    for line in &summary.insights {
      let _ = writeln!(out, "- {}", line);
    }

    let _ = writeln!(out, "\n### Change Breakdown");
    if summary.change_breakdown.is_empty() {
      let _ = writeln!(out, "- None");
    }
    for (category, count) in &summary.change_breakdown {
      let _ = writeln!(out, "- {}: {}", category.label(), count);
    }

    let _ = writeln!(out, "\n### Most Active Issues");
    if summary.most_active_issues.is_empty() {
      let _ = writeln!(out, "- None");
    }
    for (i, issue) in summary.most_active_issues.iter().enumerate() {
      let _ = writeln!(
        out,
        "{}. {} ({} changes, {}): {}",
        i + 1,
        issue.key,
        issue.change_count,
        issue.status,
        issue.summary
      );
    }

    let _ = writeln!(out, "\n### Recent Activity");
    if summary.recent_activity.is_empty() {
      let _ = writeln!(out, "- None");
    }
    for activity in &summary.recent_activity {
      let _ = writeln!(
        out,
        "- {} {}: {}",
        fmt_time(&activity.last_change),
        activity.key,
        activity.description
      );
    }
  }
  out
}
