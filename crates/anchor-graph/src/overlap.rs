//! Shared-entity counting between the two sides of a pair batch.
//!
//! Counts are computed once on the host and kept in two forms: float tensors
//! for the fusion arithmetic, and plain `Vec<usize>` for branching on
//! `overlap == 0` without reading back from the device.

use anchor_core::float_tensor_1d;
use anchor_core::ids::EntityId;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::anchor::AnchorGraph;

/// Overlap counts and anchor-graph sizes for one pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairOverlap {
    pub overlap: usize,
    pub size1: usize,
    pub size2: usize,
}

impl PairOverlap {
    /// Count from two flattened node lists; `0` never counts.
    pub fn from_nodes(nodes1: &[EntityId], nodes2: &[EntityId]) -> Self {
        let set1: BTreeSet<EntityId> = nodes1.iter().copied().filter(|&e| e != 0).collect();
        let set2: BTreeSet<EntityId> = nodes2.iter().copied().filter(|&e| e != 0).collect();
        Self {
            overlap: set1.intersection(&set2).count(),
            size1: set1.len(),
            size2: set2.len(),
        }
    }

    pub fn has_overlap(&self) -> bool {
        self.overlap > 0
    }
}

/// Batch overlap statistics: device tensors plus the host copy they came from.
#[derive(Clone, Debug)]
pub struct OverlapStats<B: Backend> {
    /// `[batch]` shared entity counts.
    pub overlap: Tensor<B, 1>,
    /// `[batch]` distinct non-padding entities in item1's anchor graph.
    pub size1: Tensor<B, 1>,
    /// `[batch]` same for item2.
    pub size2: Tensor<B, 1>,
    /// Host-side per-pair values.
    pub pairs: Vec<PairOverlap>,
}

impl<B: Backend> OverlapStats<B> {
    /// Compute statistics for two equally sized batches of anchor graphs.
    ///
    /// # Panics
    ///
    /// Panics if the batches differ in length.
    pub fn compute(graphs1: &[AnchorGraph], graphs2: &[AnchorGraph], device: &B::Device) -> Self {
        assert_eq!(
            graphs1.len(),
            graphs2.len(),
            "item1 batch has {} anchor graphs but item2 batch has {}",
            graphs1.len(),
            graphs2.len()
        );

        let pairs: Vec<PairOverlap> = graphs1
            .iter()
            .zip(graphs2)
            .map(|(g1, g2)| PairOverlap::from_nodes(&g1.flat_nodes(), &g2.flat_nodes()))
            .collect();

        Self::from_pairs(pairs, device)
    }

    /// Build tensors from already computed host values.
    pub fn from_pairs(pairs: Vec<PairOverlap>, device: &B::Device) -> Self {
        let column = |f: fn(&PairOverlap) -> usize| -> Tensor<B, 1> {
            float_tensor_1d(pairs.iter().map(|p| f(p) as f32).collect(), device)
        };
        Self {
            overlap: column(|p| p.overlap),
            size1: column(|p| p.size1),
            size2: column(|p| p.size2),
            pairs,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Host-side overlap counts.
    pub fn overlap_counts(&self) -> Vec<usize> {
        self.pairs.iter().map(|p| p.overlap).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::{init_cpu_device, to_host_f32, CpuBackend};

    #[test]
    fn test_layer0_example() {
        let stats = PairOverlap::from_nodes(&[5, 7, 0, 0], &[7, 9, 0]);
        assert_eq!(
            stats,
            PairOverlap {
                overlap: 1,
                size1: 2,
                size2: 2
            }
        );
    }

    #[test]
    fn test_padding_only_graphs_do_not_overlap() {
        let stats = PairOverlap::from_nodes(&[0, 0, 0], &[0, 0, 0]);
        assert_eq!(stats, PairOverlap::default());
        assert!(!stats.has_overlap());
    }

    #[test]
    fn test_duplicates_count_once() {
        let stats = PairOverlap::from_nodes(&[3, 3, 4], &[3, 4, 4, 4]);
        assert_eq!(stats.overlap, 2);
        assert_eq!(stats.size1, 2);
        assert_eq!(stats.size2, 2);
    }

    #[test]
    fn test_tensor_and_host_views_agree() {
        let device = init_cpu_device();
        let topk = [2, 1, 1];
        let g1 = vec![
            AnchorGraph::from_roots(topk, &[5, 7]),
            AnchorGraph::from_roots(topk, &[1]),
        ];
        let g2 = vec![
            AnchorGraph::from_roots(topk, &[7, 9]),
            AnchorGraph::from_roots(topk, &[2]),
        ];
        let stats = OverlapStats::<CpuBackend>::compute(&g1, &g2, &device);

        assert_eq!(stats.overlap_counts(), vec![1, 0]);
        assert_eq!(to_host_f32(stats.overlap), vec![1.0, 0.0]);
        assert_eq!(to_host_f32(stats.size1), vec![2.0, 1.0]);
        assert_eq!(to_host_f32(stats.size2), vec![2.0, 1.0]);
    }
}
