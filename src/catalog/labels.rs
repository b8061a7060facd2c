//! Global label frequency table.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::Item;

/// Administrative labels that describe the file rather than its content.
///
/// These never become coverage constraints unless a caller removes them
/// from the denylist.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "highres",
    "absurdres",
    "lowres",
    "commentary",
    "commentary_request",
    "english_commentary",
    "translation_request",
    "check_translation",
    "partially_translated",
    "commission",
    "paid_reward_available",
    "bad_id",
    "bad_pixiv_id",
    "tagme",
];

/// Returns the default denylist as an owned set.
pub fn default_denylist() -> HashSet<String> {
    DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()
}

/// A label and its global occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub name: String,
    pub count: usize,
}

/// Occurrence counts for every non-denylisted label in a catalog.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    counts: HashMap<String, usize>,
}

impl LabelTable {
    /// Tallies label occurrences across items, skipping denylisted labels.
    ///
    /// Counting is by occurrence: an item listing a label twice counts twice.
    pub fn tally(items: &[Item], denylist: &HashSet<String>) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for item in items {
            for label in &item.labels {
                if denylist.contains(label) {
                    continue;
                }
                *counts.entry(label.clone()).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    /// Occurrence count of a label (0 if unseen or denylisted).
    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Number of distinct counted labels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Whether a label occurs often enough to require coverage.
    pub fn is_required(&self, label: &str, threshold: usize) -> bool {
        self.counts
            .get(label)
            .is_some_and(|&count| count >= threshold)
    }

    /// Labels with `count >= threshold`, sorted by name.
    pub fn required(&self, threshold: usize) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .counts
            .iter()
            .filter(|(_, &count)| count >= threshold)
            .map(|(name, _)| name.as_str())
            .collect();
        labels.sort_unstable();
        labels
    }

    /// The `n` most frequent labels, ties broken by name.
    pub fn top(&self, n: usize) -> Vec<LabelCount> {
        let mut all: Vec<LabelCount> = self
            .counts
            .iter()
            .map(|(name, &count)| LabelCount {
                name: name.clone(),
                count,
            })
            .collect();
        all.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        all.truncate(n);
        all
    }
}
