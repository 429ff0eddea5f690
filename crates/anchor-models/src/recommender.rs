//! Neighbor-aggregation recommender.
//!
//! Independent of the path reasoner: it embeds every anchor node together
//! with its first-order knowledge-graph neighborhood, pools the nodes with
//! learned attention, and compares the two items by cosine similarity.
//!
//! ```text
//! per item:
//!   doc features ──► Linear ─ ELU ─ Linear ─ tanh ─────────────────────────┐
//!                                                                          │ concat
//!   anchor nodes [N] ──► compress ─┐                                       │
//!                                  ├ concat ─► Linear ─ tanh ─► attention ─┘
//!   Σ neighbors (ent + rel) ───────┘        [N, emb]   softmax over N, sum
//!
//!   concat ──► Linear ─ ELU ─ Linear ─ ELU ──► item vector [emb]
//!
//! score = sigmoid((cos(item1, item2) + 1) / 2)
//! ```
//!
//! Padding nodes are embedded like any other ID (row 0 is the zero vector)
//! and take part in the attention softmax.

use anchor_core::config::ModelConfig;
use anchor_core::tables::{DocFeatures, KnowledgeEmbeddings, NeighborTable};
use anchor_graph::{AnchorGraph, PairBatch};
use anyhow::{Context, Result};
use burn::tensor::activation::{sigmoid, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::sync::Arc;

use crate::layers::{elu, Compress, FeedForward};
use crate::similarity::cosine_similarity;

/// Output of [`Recommender::forward`].
#[derive(Clone, Debug)]
pub struct RecommenderOutput<B: Backend> {
    /// `[batch]` similarity scores in `[0, 1]`.
    pub predictions: Tensor<B, 1>,
    /// `[batch, emb]` final item1 vectors.
    pub item1_embeddings: Tensor<B, 2>,
    /// `[batch, emb]` final item2 vectors.
    pub item2_embeddings: Tensor<B, 2>,
}

/// Content + anchor-graph similarity model.
#[derive(Debug)]
pub struct Recommender<B: Backend> {
    config: ModelConfig,
    tables: Arc<KnowledgeEmbeddings<B>>,
    neighbors: Arc<NeighborTable>,
    docs: Arc<DocFeatures<B>>,
    news_compress: FeedForward<B>,
    entity_compress: Compress<B>,
    relation_compress: Compress<B>,
    anchor_embedding_layer: Compress<B>,
    anchor_attention: FeedForward<B>,
    mlp: FeedForward<B>,
}

impl<B: Backend> Recommender<B> {
    /// Build a recommender over shared tables.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or disagrees with any table's shape.
    pub fn new(
        config: ModelConfig,
        tables: Arc<KnowledgeEmbeddings<B>>,
        neighbors: Arc<NeighborTable>,
        docs: Arc<DocFeatures<B>>,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate()?;
        anyhow::ensure!(
            tables.dim() == config.entity_embedding_size,
            "Knowledge tables are {}-wide but entity_embedding_size is {}",
            tables.dim(),
            config.entity_embedding_size
        );
        anyhow::ensure!(
            docs.dim() == config.doc_embedding_size,
            "Document features are {}-wide but doc_embedding_size is {}",
            docs.dim(),
            config.doc_embedding_size
        );
        anyhow::ensure!(
            neighbors.slots() == config.neighbor_slots,
            "Neighbor table has {} slots but neighbor_slots is {}",
            neighbors.slots(),
            config.neighbor_slots
        );
        anyhow::ensure!(
            neighbors.n_entities() == tables.n_entities(),
            "Neighbor table covers {} entities but the embedding table has {}",
            neighbors.n_entities(),
            tables.n_entities()
        );

        let emb = config.embedding_size;
        let ext = config.entity_embedding_size;
        Ok(Self {
            news_compress: FeedForward::new(config.doc_embedding_size, emb, emb, device),
            entity_compress: Compress::new(ext, emb, device),
            relation_compress: Compress::new(ext, emb, device),
            anchor_embedding_layer: Compress::new(2 * emb, emb, device),
            anchor_attention: FeedForward::new(emb, emb, 1, device),
            mlp: FeedForward::new(2 * emb, emb, emb, device),
            config,
            tables,
            neighbors,
            docs,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Score every pair in `batch`.
    ///
    /// # Errors
    ///
    /// Fails on an empty batch or when an item has no document features.
    ///
    /// # Panics
    ///
    /// Panics when the anchor samples do not match the configured `topk`.
    pub fn forward(&self, batch: &PairBatch) -> Result<RecommenderOutput<B>> {
        anyhow::ensure!(!batch.is_empty(), "Cannot score an empty batch");

        let (graphs1, graphs2) = batch.anchor_graphs(self.config.topk);
        let item1 = self
            .item_embedding(&batch.item1, &graphs1)
            .context("Failed to embed item1 batch")?;
        let item2 = self
            .item_embedding(&batch.item2, &graphs2)
            .context("Failed to embed item2 batch")?;

        let cosine = cosine_similarity(item1.clone(), item2.clone());
        let predictions = sigmoid((cosine + 1.0) / 2.0);

        tracing::debug!(pairs = batch.len(), "Recommender forward done");
        Ok(RecommenderOutput {
            predictions,
            item1_embeddings: item1,
            item2_embeddings: item2,
        })
    }

    /// Final item vectors `[items, emb]`.
    fn item_embedding(&self, items: &[String], graphs: &[AnchorGraph]) -> Result<Tensor<B, 2>> {
        let content = self.news_compress.forward(self.docs.batch(items)?).tanh();
        let anchors = self.anchor_embedding(graphs);
        Ok(elu(self.mlp.forward(Tensor::cat(vec![content, anchors], 1))))
    }

    /// Attention-pooled anchor-graph vectors `[graphs, emb]`.
    fn anchor_embedding(&self, graphs: &[AnchorGraph]) -> Tensor<B, 2> {
        let batch = graphs.len();
        let n_nodes = self.config.anchor_nodes();
        let slots = self.neighbors.slots();
        let emb = self.config.embedding_size;

        let nodes: Vec<u32> = graphs.iter().flat_map(AnchorGraph::flat_nodes).collect();
        let node_embedding = self
            .entity_compress
            .forward(self.tables.entities(&nodes))
            .reshape([batch, n_nodes, emb]);

        let (neighbor_entities, neighbor_relations) = self.neighbors.gather(&nodes);
        let neighborhood = self.entity_compress.forward(self.tables.entities(&neighbor_entities))
            + self
                .relation_compress
                .forward(self.tables.relations(&neighbor_relations));
        let neighborhood = neighborhood
            .reshape([batch * n_nodes, slots, emb])
            .sum_dim(1)
            .reshape([batch, n_nodes, emb]);

        let anchor = self
            .anchor_embedding_layer
            .forward(Tensor::cat(vec![node_embedding, neighborhood], 2)); // [batch, N, emb]
        let weights = softmax(self.anchor_attention.forward(anchor.clone()), 1); // [batch, N, 1]

        (anchor * weights).sum_dim(1).reshape([batch, emb])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{random_docs, random_tables, ring_neighbors};
    use anchor_core::{init_cpu_device, to_host_f32, CpuBackend};
    use anchor_graph::AnchorSample;

    const N_ENTITIES: usize = 9;

    fn recommender(items: &[&str]) -> Recommender<CpuBackend> {
        let device = init_cpu_device();
        let config = ModelConfig::dev();
        Recommender::new(
            config.clone(),
            Arc::new(random_tables(&config, N_ENTITIES, 3, 5)),
            Arc::new(ring_neighbors(&config, N_ENTITIES)),
            Arc::new(random_docs(&config, items, 6)),
            &device,
        )
        .expect("consistent shapes")
    }

    fn sample(batch: usize, seed: u32) -> AnchorSample {
        // dev topk [2, 2, 2]: widths 2, 4, 8
        let layer = |width: usize, offset: u32| -> Vec<Vec<u32>> {
            (0..batch)
                .map(|b| {
                    (0..width as u32)
                        .map(|s| (s + offset + seed + b as u32) % (N_ENTITIES as u32 + 1))
                        .collect()
                })
                .collect()
        };
        AnchorSample {
            entities: vec![layer(2, 1), layer(4, 3), layer(8, 5)],
            relations: Vec::new(),
        }
    }

    #[test]
    fn test_predictions_in_unit_interval() {
        let model = recommender(&["a", "b", "c"]);
        let batch = PairBatch {
            item1: vec!["a".into(), "b".into()],
            item2: vec!["c".into(), "a".into()],
            anchors1: sample(2, 0),
            anchors2: sample(2, 4),
        };
        let out = model.forward(&batch).expect("known items");

        assert_eq!(out.item1_embeddings.dims(), [2, 8]);
        assert_eq!(out.item2_embeddings.dims(), [2, 8]);
        let predictions = to_host_f32(out.predictions);
        assert_eq!(predictions.len(), 2);
        // sigmoid over [0, 1] stays within [0.5, 0.7311]
        assert!(predictions.iter().all(|&p| (0.5..=0.7312).contains(&p)));
    }

    #[test]
    fn test_identical_inputs_score_highest() {
        let model = recommender(&["a"]);
        let batch = PairBatch {
            item1: vec!["a".into()],
            item2: vec!["a".into()],
            anchors1: sample(1, 2),
            anchors2: sample(1, 2),
        };
        let p = to_host_f32(model.forward(&batch).expect("known item").predictions)[0];
        let max = 1.0 / (1.0 + (-1.0f32).exp());
        assert!((p - max).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_item_is_an_error() {
        let model = recommender(&["a"]);
        let batch = PairBatch {
            item1: vec!["a".into()],
            item2: vec!["missing".into()],
            anchors1: sample(1, 0),
            anchors2: sample(1, 0),
        };
        assert!(model.forward(&batch).is_err());
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let device = init_cpu_device();
        let config = ModelConfig::dev();
        let wrong_slots = ModelConfig {
            neighbor_slots: config.neighbor_slots + 1,
            ..config.clone()
        };
        let result = Recommender::<CpuBackend>::new(
            wrong_slots,
            Arc::new(random_tables(&config, N_ENTITIES, 3, 5)),
            Arc::new(ring_neighbors(&config, N_ENTITIES)),
            Arc::new(random_docs(&config, &["a"], 6)),
            &device,
        );
        assert!(result.is_err());
    }
}
