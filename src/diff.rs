use std::collections::HashSet;

use serde::Serialize;

use crate::types::{Category, Delta, Direction, Snapshot};

/// Item names per category from the last applied successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Baseline {
    pub bull: Vec<String>,
    pub bear: Vec<String>,
    pub neut: Vec<String>,
}

impl Baseline {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            bull: snapshot.names(Category::Bull),
            bear: snapshot.names(Category::Bear),
            neut: snapshot.names(Category::Neut),
        }
    }

    pub fn names(&self, category: Category) -> &[String] {
        match category {
            Category::Bull => &self.bull,
            Category::Bear => &self.bear,
            Category::Neut => &self.neut,
        }
    }
}

/// Deltas of the watched categories, in bull, bear order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub deltas: Vec<(Category, Delta)>,
}

impl ChangeSet {
    pub fn delta(&self, category: Category) -> Option<&Delta> {
        self.deltas
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, d)| d)
    }

    /// Whether `category` is watched and changed.
    pub fn changed(&self, category: Category) -> bool {
        self.delta(category).is_some_and(|d| !d.is_empty())
    }

    /// True iff any watched category has a non-empty delta.
    pub fn any_change(&self) -> bool {
        self.deltas.iter().any(|(_, d)| !d.is_empty())
    }
}

/// Set difference between two name lists.
///
/// `added = current − previous`, `removed = previous − current`. Membership is
/// order-independent; each name appears at most once, in order of first
/// appearance in its source list.
pub fn diff_names(previous: &[String], current: &[String]) -> Delta {
    let prev: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let curr: HashSet<&str> = current.iter().map(String::as_str).collect();

    Delta {
        added: unique_missing(current, &prev),
        removed: unique_missing(previous, &curr),
    }
}

fn unique_missing(names: &[String], other: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| !other.contains(n.as_str()) && seen.insert(n.as_str()))
        .cloned()
        .collect()
}

/// Compare `current` against `baseline` for every category `direction` watches.
///
/// Unwatched categories are left out entirely; they still become part of the
/// next baseline, which is the caller's job.
pub fn compute_changes(baseline: &Baseline, current: &Snapshot, direction: Direction) -> ChangeSet {
    let deltas = Category::ALL
        .into_iter()
        .filter(|c| direction.watches(*c))
        .map(|c| (c, diff_names(baseline.names(c), &current.names(c))))
        .collect();
    ChangeSet { deltas }
}
