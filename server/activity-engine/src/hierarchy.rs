//! Three-tier roll-up: initiative -> sub-initiative -> work item.
//!
//! Unresolvable references never fail the build. Items land in an unassigned
//! bucket per tier, so per tier `sum(item points) == sum(node totals) + unassigned`.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::fields::{self, LogicalField};
use crate::risk::{merge_factors, RiskScorer};
use crate::types::*;

pub struct HierarchyBuilder<'a> {
  config: &'a Config,
  scorer: &'a RiskScorer,
  now: DateTime<Utc>,
}

impl<'a> HierarchyBuilder<'a> {
  pub fn new(config: &'a Config, scorer: &'a RiskScorer, now: DateTime<Utc>) -> Self {
    Self { config, scorer, now }
  }

  pub fn build(
    &self,
    initiatives: &[WorkItem],
    sub_initiatives: &[WorkItem],
    items: &[WorkItem],
  ) -> Hierarchy {
    let mut h = Hierarchy::default();

    // Pass 1: seed nodes.
    for w in initiatives {
      h.initiatives
        .entry(w.key.clone())
        .or_insert_with(|| seed(w, NodeKind::Initiative));
    }
    for e in sub_initiatives {
      h.sub_initiatives
        .entry(e.key.clone())
        .or_insert_with(|| seed(e, NodeKind::SubInitiative));
    }

    // Pass 2: sub-initiative -> initiative.
    let mut sub_parent = std::collections::BTreeMap::new();
    for e in sub_initiatives {
      let parent = fields::resolve_str(e, LogicalField::Initiative)
        .filter(|p| h.initiatives.contains_key(p));
      match parent {
        Some(p) => {
          if let Some(node) = h.initiatives.get_mut(&p) {
            if !node.sub_initiative_keys.contains(&e.key) {
              node.sub_initiative_keys.push(e.key.clone());
            }
          }
          sub_parent.insert(e.key.clone(), p);
        }
        None => {
          if !h.orphan_sub_initiatives.contains(&e.key) {
            tracing::debug!(sub_initiative = %e.key, "no resolvable parent initiative");
            h.orphan_sub_initiatives.push(e.key.clone());
          }
        }
      }
    }

    // Pass 3: items -> sub-initiative and initiative.
    for item in items {
      if h.items.contains_key(&item.key) {
        tracing::warn!(item = %item.key, "duplicate item key; later copy ignored");
        continue;
      }
      let risk_factors = self.scorer.assess_item(item, self.now);
      let done = self.config.is_done(&item.status);

      let sub = fields::resolve_str(item, LogicalField::EpicLink)
        .filter(|k| h.sub_initiatives.contains_key(k));
      let initiative = fields::resolve_str(item, LogicalField::Initiative)
        .filter(|k| h.initiatives.contains_key(k))
        .or_else(|| sub.as_ref().and_then(|s| sub_parent.get(s).cloned()));

      match sub.as_ref().and_then(|k| h.sub_initiatives.get_mut(k)) {
        Some(node) => attach(node, item, done, &risk_factors),
        None => add_unassigned(&mut h.unassigned_sub_initiative, item),
      }
      match initiative.as_ref().and_then(|k| h.initiatives.get_mut(k)) {
        Some(node) => attach(node, item, done, &risk_factors),
        None => add_unassigned(&mut h.unassigned_initiative, item),
      }

      h.items.insert(
        item.key.clone(),
        ItemRollup {
          key: item.key.clone(),
          points: item.points,
          done,
          risk_factors,
          sub_initiative: sub,
          initiative,
        },
      );
    }

    // Escalate sub-initiative risk to the parent initiative.
    for (sub_key, parent) in &sub_parent {
      let factors = match h.sub_initiatives.get(sub_key) {
        Some(node) => node.risk_factors.clone(),
        None => continue,
      };
      if let Some(node) = h.initiatives.get_mut(parent) {
        merge_factors(&mut node.risk_factors, &factors);
      }
    }

    for node in h.initiatives.values_mut().chain(h.sub_initiatives.values_mut()) {
      finalize(node);
    }

    tracing::debug!(
      initiatives = h.initiatives.len(),
      sub_initiatives = h.sub_initiatives.len(),
      items = h.items.len(),
      unassigned = h.unassigned_sub_initiative.item_keys.len(),
      "hierarchy built"
    );
    h
  }
}

/// Empty node for `item`. Its risk factors come only from child items.
fn seed(item: &WorkItem, kind: NodeKind) -> RollupNode {
  RollupNode {
    key: item.key.clone(),
    kind,
    title: item.summary.clone(),
    status: item.status.clone(),
    target_period: fields::resolve_str(item, LogicalField::TargetPeriod),
    risk_factors: Vec::new(),
    child_item_keys: Vec::new(),
    sub_initiative_keys: Vec::new(),
    item_count: 0,
    completed_item_count: 0,
    total_points: 0.0,
    completed_points: 0.0,
    completion_rate: 0.0,
  }
}

fn attach(node: &mut RollupNode, item: &WorkItem, done: bool, risk_factors: &[String]) {
  node.child_item_keys.push(item.key.clone());
  node.item_count += 1;
  if done {
    node.completed_item_count += 1;
  }
  node.total_points += item.points.total;
  node.completed_points += item.points.done;
  merge_factors(&mut node.risk_factors, risk_factors);
}

fn add_unassigned(bucket: &mut UnassignedBucket, item: &WorkItem) {
  bucket.item_keys.push(item.key.clone());
  bucket.total_points += item.points.total;
  bucket.completed_points += item.points.done;
}

fn finalize(node: &mut RollupNode) {
  node.completion_rate = completion_rate(node.completed_points, node.total_points);
  let mut deduped = Vec::with_capacity(node.risk_factors.len());
  merge_factors(&mut deduped, &node.risk_factors);
  node.risk_factors = deduped;
}

/// completed / total, clamped to [0, 1]; 0 when there is nothing to complete.
pub fn completion_rate(completed: f64, total: f64) -> f64 {
  if total <= 0.0 || !total.is_finite() || !completed.is_finite() {
    return 0.0;
  }
  (completed / total).clamp(0.0, 1.0)
}
