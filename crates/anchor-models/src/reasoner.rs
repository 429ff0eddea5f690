//! End-to-end path-reasoning relevance model.
//!
//! ```text
//! PairBatch
//!   │  trace_pairs          (anchor graphs, overlap, subgraphs, paths)
//!   ▼
//! PairPaths ×batch ──► PathScorer ──► path_scores [batch]
//!                                          │
//! OverlapStats (overlap, size1, size2) ────┴──► fuse_scores ──► predictions [batch] ∈ [-1, 1]
//! ```

use anchor_core::config::ModelConfig;
use anchor_core::ids::{EntityId, ItemId, RelationId};
use anchor_core::tables::KnowledgeEmbeddings;
use anchor_core::to_host_f32;
use anchor_graph::{trace_pairs, OverlapStats, PairBatch, PairOverlap, PairPaths, PathEnumerator};
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::Serialize;
use std::sync::Arc;

use crate::fusion::fuse_scores;
use crate::path_scorer::PathScorer;

/// Introspection record for one pair.
#[derive(Clone, Debug, Serialize)]
pub struct PairTrace {
    pub item1: ItemId,
    pub item2: ItemId,
    pub prediction: f32,
    pub path_score: f32,
    #[serde(flatten)]
    pub overlap: PairOverlap,
    /// Interior entity sequence per path; `[[0]]` when the pair has no overlap.
    pub paths: Vec<Vec<EntityId>>,
    /// Relation sequence per path, aligned with `paths`.
    pub relations: Vec<Vec<RelationId>>,
    /// Score of each path; empty when nothing was scored.
    pub path_scores: Vec<f32>,
    #[serde(skip)]
    pub pair_paths: PairPaths,
}

/// Output of [`Reasoner::forward`].
#[derive(Clone, Debug)]
pub struct ReasonerOutput<B: Backend> {
    /// `[batch]` fused relevance scores.
    pub predictions: Tensor<B, 1>,
    /// `[batch]` summed path scores before fusion.
    pub path_scores: Tensor<B, 1>,
    pub overlap: OverlapStats<B>,
    pub traces: Vec<PairTrace>,
}

/// Path-reasoning relevance model.
#[derive(Debug)]
pub struct Reasoner<B: Backend> {
    config: ModelConfig,
    scorer: PathScorer<B>,
    enumerator: PathEnumerator,
    device: B::Device,
}

impl<B: Backend> Reasoner<B> {
    /// Build a reasoner over shared knowledge tables.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or does not match the tables.
    pub fn new(
        config: ModelConfig,
        tables: Arc<KnowledgeEmbeddings<B>>,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate()?;
        let scorer = PathScorer::new(&config, tables, device)?;
        Ok(Self {
            enumerator: PathEnumerator::new(config.max_path_edges),
            config,
            scorer,
            device: device.clone(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn scorer(&self) -> &PathScorer<B> {
        &self.scorer
    }

    /// Score every pair in `batch`.
    ///
    /// # Panics
    ///
    /// Panics on an empty batch or when the anchor samples do not match the
    /// configured `topk`.
    pub fn forward(&self, batch: &PairBatch) -> ReasonerOutput<B> {
        assert!(!batch.is_empty(), "cannot reason over an empty batch");

        let reasoning = trace_pairs::<B>(batch, self.config.topk, &self.enumerator, &self.device);
        let (path_scores, per_path) = self.scorer.score_batch(&reasoning.paths);

        let predictions = fuse_scores(
            path_scores.clone(),
            reasoning.overlap.overlap.clone(),
            reasoning.overlap.size1.clone(),
            reasoning.overlap.size2.clone(),
        );

        let host_predictions = to_host_f32(predictions.clone());
        let host_path_scores = to_host_f32(path_scores.clone());
        let traces = reasoning
            .paths
            .into_iter()
            .zip(per_path)
            .enumerate()
            .map(|(i, (pair_paths, path_scores))| PairTrace {
                item1: batch.item1[i].clone(),
                item2: batch.item2[i].clone(),
                prediction: host_predictions[i],
                path_score: host_path_scores[i],
                overlap: reasoning.overlap.pairs[i],
                paths: pair_paths.node_trace(),
                relations: pair_paths.relation_trace(),
                path_scores,
                pair_paths,
            })
            .collect();

        tracing::debug!(pairs = batch.len(), "Reasoner forward done");

        ReasonerOutput {
            predictions,
            path_scores,
            overlap: reasoning.overlap,
            traces,
        }
    }
}
