//! Core engine: runs one report over an already-fetched input snapshot.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::aggregate::{self, TeamAggregator};
use crate::config::Config;
use crate::date::{self, DateRange};
use crate::error::EngineError;
use crate::hierarchy::HierarchyBuilder;
use crate::links::{self, KeyMatcher};
use crate::normalize;
use crate::risk::{self, RiskScorer};
use crate::state::{self, SyncStateStore};
use crate::types::*;

/// The activity aggregation engine. Holds configuration only; every run is
/// independent.
pub struct Engine {
  config: Config,
  scorer: RiskScorer,
  aggregator: TeamAggregator,
  matcher: KeyMatcher,
}

impl Engine {
  pub fn new(config: Config) -> Result<Self, EngineError> {
    let matcher = KeyMatcher::new(&config.key_prefixes)?;
    Ok(Self {
      scorer: RiskScorer::new(config.clone()),
      aggregator: TeamAggregator::new(&config),
      matcher,
      config,
    })
  }

  /// Run the whole pipeline. Fails only on caller contract violations.
  pub fn run(&self, input: &ReportInput, fallback_now: DateTime<Utc>) -> Result<ReportOutput, EngineError> {
    let range = DateRange::parse(&input.range.start, &input.range.end)?;
    let now = match &input.now {
      Some(raw) => date::parse_timestamp(raw)
        .ok_or_else(|| EngineError::validation("now", "invalid RFC3339"))?,
      None => fallback_now,
    };

    let items = normalize::normalize_items(&input.items, &self.config);
    let initiatives = normalize::normalize_items(&input.initiatives, &self.config);
    let sub_initiatives = normalize::normalize_items(&input.sub_initiatives, &self.config);

    let hierarchy = HierarchyBuilder::new(&self.config, &self.scorer, now).build(
      &initiatives.items,
      &sub_initiatives.items,
      &items.items,
    );
    let hierarchy_risk = risk::score_hierarchy(&hierarchy);
    let (pull_requests, pr_diagnostics) = normalize::normalize_pull_requests(&input.pull_requests);
    let links = links::link_pull_requests(&self.matcher, &items.items, &pull_requests);

    let summaries = self.aggregator.aggregate(&items.items, &range);
    let teams = aggregate::to_structured(&summaries, &range);
    let narrative = aggregate::to_narrative(&summaries, &range);

    let duplicate_prs = links.duplicate_pr_ids.iter().map(|id| Diagnostic {
      item_key: None,
      field: "pull_requests.id".into(),
      reason: format!("duplicate pull request id {:?}; extracted keys merged", id),
    });
    let diagnostics: Vec<Diagnostic> = items
      .diagnostics
      .into_iter()
      .chain(initiatives.diagnostics)
      .chain(sub_initiatives.diagnostics)
      .chain(pr_diagnostics)
      .chain(duplicate_prs)
      .collect();

    let mut warnings = Vec::new();
    let mut previous_run = None;
    let mut incremental_start = None;
    if let Some(path) = &input.state_file {
      let store = SyncStateStore::new(path);
      let last_run = store.last_run_timestamp();
      previous_run = last_run.map(format_time);
      incremental_start = Some(format_time(state::incremental_range(&range, last_run).start));
      if let Err(e) = store.save_last_run_timestamp(now) {
        tracing::warn!(error = %e, "failed to save watermark; next run will refetch the full range");
        warnings.push(e.to_string());
      }
    }

    tracing::info!(
      teams = summaries.len(),
      items = items.items.len(),
      skipped = diagnostics.len(),
      risk_score = hierarchy_risk.score,
      "report generated"
    );

    Ok(ReportOutput {
      report_id: report_id(&range, &items.items),
      period: teams.period.clone(),
      generated_at: format_time(now),
      teams,
      narrative,
      hierarchy,
      hierarchy_risk,
      links,
      previous_run,
      incremental_start,
      diagnostics,
      warnings,
    })
  }
}

fn format_time(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Stable report ID: hash of the window and the sorted item keys.
fn report_id(range: &DateRange, items: &[WorkItem]) -> String {
  let mut keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
  keys.sort_unstable();

  let mut hasher = blake3::Hasher::new();
  hasher.update(range.start.to_rfc3339().as_bytes());
  hasher.update(b"|");
  hasher.update(range.end.to_rfc3339().as_bytes());
  for key in keys {
    hasher.update(b"|");
    hasher.update(key.as_bytes());
  }
  let hex = hasher.finalize().to_hex();
  format!("rpt-{}", &hex[..16])
}
