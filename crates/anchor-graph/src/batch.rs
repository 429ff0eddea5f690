//! Pair batches and the graph half of the reasoning pipeline.
//!
//! ```text
//! PairBatch ──► AnchorGraph ×2 ──► OverlapStats ──► PairSubgraph? ──► PairPaths
//! ```

use anchor_core::config::ANCHOR_LAYERS;
use anchor_core::ids::ItemId;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::anchor::{build_anchor_graphs, AnchorGraph, AnchorSample};
use crate::overlap::OverlapStats;
use crate::paths::{enumerate_pair_paths, PairPaths, PathEnumerator};
use crate::subgraph::assemble_subgraphs;

/// A batch of item pairs with their sampled anchor graphs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairBatch {
    pub item1: Vec<ItemId>,
    pub item2: Vec<ItemId>,
    pub anchors1: AnchorSample,
    pub anchors2: AnchorSample,
}

impl PairBatch {
    pub fn len(&self) -> usize {
        self.item1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item1.is_empty()
    }

    /// Per-item anchor graphs for both sides.
    ///
    /// # Panics
    ///
    /// Panics if the item lists and anchor samples disagree on batch size, or
    /// the samples do not match `topk`.
    pub fn anchor_graphs(
        &self,
        topk: [usize; ANCHOR_LAYERS],
    ) -> (Vec<AnchorGraph>, Vec<AnchorGraph>) {
        let graphs1 = build_anchor_graphs(&self.anchors1, topk);
        let graphs2 = build_anchor_graphs(&self.anchors2, topk);
        assert!(
            self.item2.len() == self.len()
                && graphs1.len() == self.len()
                && graphs2.len() == self.len(),
            "pair batch of {} item1 ids has {} item2 ids and {}/{} anchor graphs",
            self.len(),
            self.item2.len(),
            graphs1.len(),
            graphs2.len()
        );
        (graphs1, graphs2)
    }
}

/// Graph-side results for a batch.
#[derive(Clone, Debug)]
pub struct PairReasoning<B: Backend> {
    pub graphs1: Vec<AnchorGraph>,
    pub graphs2: Vec<AnchorGraph>,
    pub overlap: OverlapStats<B>,
    pub paths: Vec<PairPaths>,
}

/// Build anchor graphs, count overlap and enumerate paths for every pair.
pub fn trace_pairs<B: Backend>(
    batch: &PairBatch,
    topk: [usize; ANCHOR_LAYERS],
    enumerator: &PathEnumerator,
    device: &B::Device,
) -> PairReasoning<B> {
    let (graphs1, graphs2) = batch.anchor_graphs(topk);
    let overlap = OverlapStats::compute(&graphs1, &graphs2, device);
    let subgraphs = assemble_subgraphs(
        &batch.item1,
        &batch.item2,
        &graphs1,
        &graphs2,
        &overlap.pairs,
    );
    let paths = enumerate_pair_paths(enumerator, &batch.item1, &batch.item2, &subgraphs);

    tracing::debug!(
        pairs = batch.len(),
        with_overlap = subgraphs.iter().filter(|s| s.is_some()).count(),
        paths = paths.iter().map(|p| p.paths().len()).sum::<usize>(),
        "Traced pair batch"
    );

    PairReasoning {
        graphs1,
        graphs2,
        overlap,
        paths,
    }
}
