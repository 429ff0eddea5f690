//! Co-click pair mining for building relevance labels.
//!
//! Two items are a positive pair when many of the users who clicked one also
//! clicked the other, relative to how popular each item is on its own:
//!
//! ```text
//! weight(a, b) = co_clicks(a, b) / sqrt(clicks(a) * clicks(b))
//! ```
//!
//! Only items with more than `min_item_clicks` clicks take part, and only
//! pairs whose weight exceeds `min_weight` are returned.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::ItemId;

/// Thresholds for [`CoClickMiner::positive_pairs`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoClickConfig {
    /// Items need strictly more clicks than this.
    pub min_item_clicks: usize,
    /// Pairs need a weight strictly above this.
    pub min_weight: f64,
}

impl Default for CoClickConfig {
    fn default() -> Self {
        Self {
            min_item_clicks: 10,
            min_weight: 0.05,
        }
    }
}

/// An unordered item pair with its normalized co-click weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedPair {
    pub item1: ItemId,
    pub item2: ItemId,
    pub co_clicks: usize,
    pub weight: f64,
}

/// Accumulates click events and per-user click sets.
#[derive(Clone, Debug, Default)]
pub struct CoClickMiner {
    clicks: HashMap<ItemId, usize>,
    histories: IndexMap<String, IndexSet<ItemId>>,
}

impl CoClickMiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one click. Every event counts towards the item's popularity;
    /// the user's history is a set.
    pub fn record_click(&mut self, user: &str, item: &str) {
        if item.is_empty() {
            return;
        }
        *self.clicks.entry(item.to_string()).or_insert(0) += 1;
        self.histories
            .entry(user.to_string())
            .or_default()
            .insert(item.to_string());
    }

    /// Record a whole click history for `user`.
    pub fn record_history<'a>(&mut self, user: &str, items: impl IntoIterator<Item = &'a str>) {
        for item in items {
            self.record_click(user, item);
        }
    }

    /// Total clicks seen for `item`.
    pub fn clicks(&self, item: &str) -> usize {
        self.clicks.get(item).copied().unwrap_or(0)
    }

    pub fn n_users(&self) -> usize {
        self.histories.len()
    }

    /// Unordered co-click counts, keyed with the lexicographically smaller item first.
    pub fn co_click_counts(&self) -> HashMap<(ItemId, ItemId), usize> {
        let mut counts = HashMap::new();
        for history in self.histories.values() {
            let items: Vec<&ItemId> = history.iter().collect();
            for i in 0..items.len() {
                for j in (i + 1)..items.len() {
                    let key = ordered_pair(items[i], items[j]);
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Pairs passing both thresholds, by descending weight then item IDs.
    pub fn positive_pairs(&self, config: &CoClickConfig) -> Vec<WeightedPair> {
        let mut pairs: Vec<WeightedPair> = self
            .co_click_counts()
            .into_iter()
            .filter_map(|((a, b), co_clicks)| {
                let clicks_a = self.clicks(&a);
                let clicks_b = self.clicks(&b);
                if clicks_a <= config.min_item_clicks || clicks_b <= config.min_item_clicks {
                    return None;
                }
                let weight = co_clicks as f64 / ((clicks_a * clicks_b) as f64).sqrt();
                (weight > config.min_weight).then_some(WeightedPair {
                    item1: a,
                    item2: b,
                    co_clicks,
                    weight,
                })
            })
            .collect();

        pairs.sort_by(|x, y| {
            y.weight
                .partial_cmp(&x.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.item1.cmp(&y.item1))
                .then_with(|| x.item2.cmp(&y.item2))
        });

        tracing::debug!(
            users = self.n_users(),
            items = self.clicks.len(),
            positives = pairs.len(),
            "Mined co-click pairs"
        );
        pairs
    }
}

fn ordered_pair(a: &ItemId, b: &ItemId) -> (ItemId, ItemId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_miner() -> CoClickMiner {
        let mut miner = CoClickMiner::new();
        // 12 users click both A and B, 12 more click only C
        for u in 0..12 {
            miner.record_history(&format!("u{u}"), ["A", "B"]);
        }
        for u in 12..24 {
            miner.record_history(&format!("u{u}"), ["C"]);
        }
        miner
    }

    #[test]
    fn test_co_click_counts_are_unordered() {
        let mut miner = CoClickMiner::new();
        miner.record_history("u1", ["B", "A"]);
        miner.record_history("u2", ["A", "B", "A"]);

        let counts = miner.co_click_counts();
        assert_eq!(counts.get(&("A".to_string(), "B".to_string())), Some(&2));
        assert_eq!(counts.len(), 1);
        assert_eq!(miner.clicks("A"), 3);
    }

    #[test]
    fn test_positive_pairs_weight() {
        let pairs = busy_miner().positive_pairs(&CoClickConfig::default());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].item1, "A");
        assert_eq!(pairs[0].item2, "B");
        assert_eq!(pairs[0].co_clicks, 12);
        assert!((pairs[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_click_threshold_is_strict() {
        let config = CoClickConfig {
            min_item_clicks: 12,
            ..Default::default()
        };
        assert!(busy_miner().positive_pairs(&config).is_empty());
    }

    #[test]
    fn test_empty_items_are_ignored() {
        let mut miner = CoClickMiner::new();
        miner.record_history("u1", ["", "A"]);
        assert_eq!(miner.clicks(""), 0);
        assert_eq!(miner.clicks("A"), 1);
    }
}
