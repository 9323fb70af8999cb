//! Diff computation between observed and wanted maps

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource name to "should be present/active"
pub type StateMap = BTreeMap<String, bool>;

/// Outstanding changes for one resource kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDiff {
    /// Names that should become present/active
    pub to_enable: Vec<String>,
    /// Names that should become absent/inactive
    pub to_disable: Vec<String>,
}

impl KindDiff {
    pub fn is_empty(&self) -> bool {
        self.to_enable.is_empty() && self.to_disable.is_empty()
    }

    /// Number of names touched
    pub fn len(&self) -> usize {
        self.to_enable.len() + self.to_disable.len()
    }
}

/// Compute the changes needed to take `current` to `wanted`.
///
/// A name missing from `current` counts as absent. Output is sorted by
/// name, so the same inputs always produce the same scripts.
pub fn diff(current: &StateMap, wanted: &StateMap) -> KindDiff {
    let mut result = KindDiff::default();
    for (name, &want) in wanted {
        let have = current.get(name).copied().unwrap_or(false);
        if want == have {
            continue;
        }
        if want {
            result.to_enable.push(name.clone());
        } else {
            result.to_disable.push(name.clone());
        }
    }
    result
}

/// Diff summary statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of names to enable or install
    pub additions: usize,
    /// Number of names to disable or remove
    pub removals: usize,
    /// Number of singleton settings with a pending override
    pub settings: usize,
}

impl DiffSummary {
    pub fn add(&mut self, diff: &KindDiff) {
        self.additions += diff.to_enable.len();
        self.removals += diff.to_disable.len();
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.settings
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
