//! Diff between two snapshots.
//!
//! Reports which sites entered or left the listing so a refresh can be
//! summarized in the logs. Order follows the snapshot's site name list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::Snapshot;

/// Sites added and removed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDiff {
    /// In the current snapshot but not the previous one
    pub added: Vec<String>,
    /// In the previous snapshot but not the current one
    pub removed: Vec<String>,
    /// Record count change, current minus previous
    pub count_delta: i64,
}

impl SiteDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || self.count_delta != 0
    }
}

/// Calculate the diff. A missing previous snapshot counts as empty.
pub fn calculate_diff(previous: Option<&Snapshot>, current: &Snapshot) -> SiteDiff {
    let previous_names: &[String] = previous.map(|p| p.site_names.as_slice()).unwrap_or_default();

    let prev: HashSet<&str> = previous_names.iter().map(String::as_str).collect();
    let curr: HashSet<&str> = current.site_names.iter().map(String::as_str).collect();

    let added = current
        .site_names
        .iter()
        .filter(|name| !prev.contains(name.as_str()))
        .cloned()
        .collect();

    let removed = previous_names
        .iter()
        .filter(|name| !curr.contains(name.as_str()))
        .cloned()
        .collect();

    let previous_count = previous.map(Snapshot::len).unwrap_or(0);

    SiteDiff {
        added,
        removed,
        count_delta: current.len() as i64 - previous_count as i64,
    }
}
