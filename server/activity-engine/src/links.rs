//! Link pull requests to work items by key references.
//!
//! Keys are pulled out of the PR title, body, branch name and commit
//! messages. Linkage is one-directional (PR -> items) and derived: nothing is
//! stored on the PR itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use regex::Regex;

use crate::error::EngineError;
use crate::types::{LinkReport, LinkedItem, PullRequest, PullRequestRef, WorkItem};

/// Case-insensitive, word-bounded matcher for `PREFIX-123` style keys.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
  re: Regex,
}

impl KeyMatcher {
  pub fn new(prefixes: &[String]) -> Result<Self, EngineError> {
    let alternatives: Vec<String> = prefixes
      .iter()
      .map(|p| p.trim())
      .filter(|p| !p.is_empty())
      .map(regex::escape)
      .collect();
    if alternatives.is_empty() {
      return Err(EngineError::validation("key_prefixes", "must name at least one prefix"));
    }
    let pattern = format!(r"(?i)\b(?:{})-\d+\b", alternatives.join("|"));
    let re = Regex::new(&pattern).map_err(|e| EngineError::validation("key_prefixes", &e.to_string()))?;
    Ok(Self { re })
  }

  /// Upper-cased keys in `text`, in order of appearance (duplicates kept).
  pub fn find_in<'t>(&'t self, text: &'t str) -> impl Iterator<Item = String> + 't {
    self.re.find_iter(text).map(|m| m.as_str().to_ascii_uppercase())
  }

  /// Deduplicated keys referenced anywhere in a PR, first appearance wins.
  pub fn extract_keys(&self, pr: &PullRequest) -> Vec<String> {
    let sources = std::iter::once(pr.title.as_str())
      .chain(pr.body.as_deref())
      .chain(pr.branch_name.as_deref())
      .chain(pr.commits.iter().map(|c| c.message.as_str()));

    let mut seen = BTreeSet::new();
    let mut keys = Vec::new();
    for text in sources {
      for key in self.find_in(text) {
        if seen.insert(key.clone()) {
          keys.push(key);
        }
      }
    }
    keys
  }
}

fn pr_ref(pr: &PullRequest) -> PullRequestRef {
  PullRequestRef {
    id: pr.id.clone(),
    title: pr.title.clone(),
    author: pr.author.clone(),
    merged_at: pr.merged_at.clone(),
    url: pr.url.clone(),
  }
}

/// Build new linked views of `items`; inputs are left untouched.
///
/// Equivalent to filtering every PR per item, but done with one inverted
/// index pass. Each item's PRs keep the input PR order.
pub fn link_pull_requests(
  matcher: &KeyMatcher,
  items: &[WorkItem],
  pull_requests: &[PullRequest],
) -> LinkReport {
  let mut pr_keys: BTreeMap<String, Vec<String>> = BTreeMap::new();
  let mut duplicate_pr_ids = Vec::new();
  let mut index: HashMap<String, Vec<usize>> = HashMap::new();
  for (i, pr) in pull_requests.iter().enumerate() {
    let keys = matcher.extract_keys(pr);
    for key in &keys {
      index.entry(key.clone()).or_default().push(i);
    }
    match pr_keys.get_mut(&pr.id) {
      Some(existing) => {
        tracing::warn!(pr = %pr.id, "duplicate pull request id; keys merged");
        if !duplicate_pr_ids.contains(&pr.id) {
          duplicate_pr_ids.push(pr.id.clone());
        }
        for key in keys {
          if !existing.contains(&key) {
            existing.push(key);
          }
        }
      }
      None => {
        pr_keys.insert(pr.id.clone(), keys);
      }
    }
  }

  let linked: Vec<LinkedItem> = items
    .iter()
    .map(|item| {
      let lookup = item.key.to_ascii_uppercase();
      let pull_requests = index
        .get(&lookup)
        .map(|ids| ids.iter().map(|&i| pr_ref(&pull_requests[i])).collect())
        .unwrap_or_default();
      LinkedItem {
        key: item.key.clone(),
        pull_requests,
      }
    })
    .collect();

  let known: BTreeSet<String> = items.iter().map(|i| i.key.to_ascii_uppercase()).collect();
  let unmatched_keys: Vec<String> = index
    .keys()
    .filter(|k| !known.contains(*k))
    .cloned()
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();

  tracing::debug!(
    pull_requests = pull_requests.len(),
    linked_items = linked.iter().filter(|l| !l.pull_requests.is_empty()).count(),
    unmatched = unmatched_keys.len(),
    "pull requests linked"
  );

  LinkReport {
    items: linked,
    pr_keys,
    unmatched_keys,
    duplicate_pr_ids,
  }
}
