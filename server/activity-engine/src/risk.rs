//! Per-item risk predicates and hierarchy-level risk scoring.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::types::{Hierarchy, HierarchyRisk, RollupNode, WorkItem};

pub const OVERDUE: &str = "overdue";
pub const NO_MOVEMENT: &str = "no_movement_14_days";

/// Days without an update before an item counts as stalled.
pub const STALE_AFTER_DAYS: i64 = 14;

const SUB_INITIATIVE_WEIGHT: f64 = 0.3;
const INITIATIVE_WEIGHT: f64 = 0.2;

/// A named predicate over one item.
#[derive(Clone, Copy)]
pub struct RiskRule {
  pub factor: &'static str,
  pub check: fn(&WorkItem, DateTime<Utc>, &Config) -> bool,
}

impl std::fmt::Debug for RiskRule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RiskRule").field("factor", &self.factor).finish()
  }
}

fn is_overdue(item: &WorkItem, now: DateTime<Utc>, config: &Config) -> bool {
  match item.due_date {
    Some(due) => now > due && !config.is_done(&item.status),
    None => false,
  }
}

fn has_no_movement(item: &WorkItem, now: DateTime<Utc>, _config: &Config) -> bool {
  match item.updated {
    Some(updated) => now - updated >= Duration::days(STALE_AFTER_DAYS),
    None => false,
  }
}

/// Ordered rule table. Scope-creep and confidence-drop rules are expected to
/// be added through [`RiskScorer::with_rule`] once their semantics exist.
#[derive(Debug, Clone)]
pub struct RiskScorer {
  config: Config,
  rules: Vec<RiskRule>,
}

impl RiskScorer {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      rules: vec![
        RiskRule {
          factor: OVERDUE,
          check: is_overdue,
        },
        RiskRule {
          factor: NO_MOVEMENT,
          check: has_no_movement,
        },
      ],
    }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  /// Append a rule; it runs after the existing ones.
  pub fn with_rule(mut self, rule: RiskRule) -> Self {
    self.rules.push(rule);
    self
  }

  pub fn rules(&self) -> &[RiskRule] {
    &self.rules
  }

  /// Factors that hold for `item` at `now`, in rule order. Pure.
  pub fn assess_item(&self, item: &WorkItem, now: DateTime<Utc>) -> Vec<String> {
    self
      .rules
      .iter()
      .filter(|rule| (rule.check)(item, now, &self.config))
      .map(|rule| rule.factor.to_string())
      .collect()
  }
}

/// Append `factors` to `into`, skipping ones already present.
pub fn merge_factors(into: &mut Vec<String>, factors: &[String]) {
  for f in factors {
    if !into.contains(f) {
      into.push(f.clone());
    }
  }
}

/// Union of the factors rolled onto the node and those of its child items.
fn node_union(node: &RollupNode, hierarchy: &Hierarchy) -> Vec<String> {
  let mut factors = node.risk_factors.clone();
  for key in &node.child_item_keys {
    if let Some(item) = hierarchy.items.get(key) {
      merge_factors(&mut factors, &item.risk_factors);
    }
  }
  factors
}

fn fraction(part: usize, whole: usize) -> f64 {
  if whole == 0 {
    0.0
  } else {
    part as f64 / whole as f64
  }
}

/// Normalized 0..1 risk for a whole hierarchy.
///
/// Item-level risk dominates; risky sub-initiatives and initiatives add
/// smaller weighted penalties on top.
pub fn score_hierarchy(hierarchy: &Hierarchy) -> HierarchyRisk {
  let mut node_factors = BTreeMap::new();

  let mut risky_sub_initiatives = 0;
  for (key, node) in &hierarchy.sub_initiatives {
    let factors = node_union(node, hierarchy);
    if !factors.is_empty() {
      risky_sub_initiatives += 1;
    }
    node_factors.insert(key.clone(), factors);
  }

  let mut risky_initiatives = 0;
  for (key, node) in &hierarchy.initiatives {
    let mut factors = node_union(node, hierarchy);
    for sub in &node.sub_initiative_keys {
      if let Some(sub_factors) = node_factors.get(sub) {
        merge_factors(&mut factors, sub_factors);
      }
    }
    if !factors.is_empty() {
      risky_initiatives += 1;
    }
    node_factors.insert(key.clone(), factors);
  }

  let total_items = hierarchy.items.len();
  let risky_items = hierarchy
    .items
    .values()
    .filter(|i| !i.risk_factors.is_empty())
    .count();

  let score = (fraction(risky_items, total_items)
    + SUB_INITIATIVE_WEIGHT * fraction(risky_sub_initiatives, hierarchy.sub_initiatives.len())
    + INITIATIVE_WEIGHT * fraction(risky_initiatives, hierarchy.initiatives.len()))
  .min(1.0);

  HierarchyRisk {
    score: (score * 1000.0).round() / 1000.0,
    total_items,
    risky_items,
    total_sub_initiatives: hierarchy.sub_initiatives.len(),
    risky_sub_initiatives,
    total_initiatives: hierarchy.initiatives.len(),
    risky_initiatives,
    node_factors,
  }
}
