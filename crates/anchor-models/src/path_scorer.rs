//! Learned scoring of reasoning paths.
//!
//! Each path is encoded on its own, one GRU step per interior entity:
//!
//! ```text
//! step t:  compress(entity[t]) (+ compress(relation[t]))   [1, t, emb]
//!                    │
//!                   GRU ──► last hidden state ──► Linear ─ ELU ─ Linear ──► raw score
//!                                                                 │
//!                                        node_relation mode: sigmoid
//! ```
//!
//! A pair's score is the SUM over its paths, so pairs backed by many paths
//! score higher. Pairs without overlap and pairs with no path score exactly 0
//! and never reach the encoder.

use anchor_core::config::{ModelConfig, PathScoringMode};
use anchor_core::tables::KnowledgeEmbeddings;
use anchor_core::to_host_f32;
use anchor_graph::{PairPaths, ReasoningPath};
use anyhow::Result;
use burn::nn::gru::{Gru, GruConfig};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::sync::Arc;

use crate::layers::{Compress, FeedForward};

/// Score of one pair.
#[derive(Clone, Debug)]
pub struct PairScore<B: Backend> {
    /// `[1]` sum of the path scores.
    pub total: Tensor<B, 1>,
    /// Host copy of each path's score, in path order.
    pub per_path: Vec<f32>,
}

/// GRU path encoder with a scalar head.
#[derive(Debug)]
pub struct PathScorer<B: Backend> {
    tables: Arc<KnowledgeEmbeddings<B>>,
    entity_compress: Compress<B>,
    relation_compress: Compress<B>,
    gru: Gru<B>,
    head: FeedForward<B>,
    mode: PathScoringMode,
    embedding_size: usize,
    device: B::Device,
}

impl<B: Backend> PathScorer<B> {
    /// Create a scorer with freshly initialised weights.
    ///
    /// # Errors
    ///
    /// Fails if the tables' width differs from `config.entity_embedding_size`.
    pub fn new(
        config: &ModelConfig,
        tables: Arc<KnowledgeEmbeddings<B>>,
        device: &B::Device,
    ) -> Result<Self> {
        anyhow::ensure!(
            tables.dim() == config.entity_embedding_size,
            "Knowledge tables are {}-wide but entity_embedding_size is {}",
            tables.dim(),
            config.entity_embedding_size
        );
        let emb = config.embedding_size;
        Ok(Self {
            tables,
            entity_compress: Compress::new(config.entity_embedding_size, emb, device),
            relation_compress: Compress::new(config.entity_embedding_size, emb, device),
            gru: GruConfig::new(emb, emb, true).init(device),
            head: FeedForward::new(emb, emb, 1, device),
            mode: config.path_scoring,
            embedding_size: emb,
            device: device.clone(),
        })
    }

    pub fn mode(&self) -> PathScoringMode {
        self.mode
    }

    /// Score a single path, `[1]`.
    ///
    /// # Panics
    ///
    /// Panics on an empty path, when the entity and relation sequences differ
    /// in length, or on an ID outside the tables.
    pub fn score_path(&self, path: &ReasoningPath) -> Tensor<B, 1> {
        let steps = path.entities.len();
        assert!(steps > 0, "cannot score a path without interior entities");
        assert_eq!(
            path.relations.len(),
            steps,
            "path has {} entities but {} relations",
            steps,
            path.relations.len()
        );

        let nodes = self.entity_compress.forward(self.tables.entities(&path.entities));
        let inputs = match self.mode {
            PathScoringMode::NodeOnly => nodes,
            PathScoringMode::NodeRelation => {
                nodes + self.relation_compress.forward(self.tables.relations(&path.relations))
            }
        };

        let emb = self.embedding_size;
        let sequence = inputs.reshape([1, steps, emb]);
        let hidden = self.gru.forward(sequence, None); // [1, steps, emb]
        let last = hidden.slice([0..1, steps - 1..steps, 0..emb]).reshape([1, emb]);
        let raw = self.head.forward(last); // [1, 1]

        let score = match self.mode {
            PathScoringMode::NodeOnly => raw,
            PathScoringMode::NodeRelation => sigmoid(raw),
        };
        score.reshape([1])
    }

    /// Sum of path scores for one pair.
    pub fn score_pair(&self, paths: &PairPaths) -> PairScore<B> {
        let paths = paths.paths();
        if paths.is_empty() {
            return PairScore {
                total: Tensor::zeros([1], &self.device),
                per_path: Vec::new(),
            };
        }

        let scores = Tensor::cat(paths.iter().map(|p| self.score_path(p)).collect(), 0);
        PairScore {
            total: scores.clone().sum(),
            per_path: to_host_f32(scores),
        }
    }

    /// Scores for a batch of pairs: `[batch]` totals and host per-path scores.
    ///
    /// # Panics
    ///
    /// Panics on an empty batch.
    pub fn score_batch(&self, batch: &[PairPaths]) -> (Tensor<B, 1>, Vec<Vec<f32>>) {
        assert!(!batch.is_empty(), "cannot score an empty batch");
        let (totals, per_path): (Vec<_>, Vec<_>) = batch
            .iter()
            .map(|paths| {
                let score = self.score_pair(paths);
                (score.total, score.per_path)
            })
            .unzip();
        (Tensor::cat(totals, 0), per_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::random_tables;
    use anchor_core::{init_cpu_device, to_host_f32, CpuBackend};

    fn scorer(mode: PathScoringMode) -> PathScorer<CpuBackend> {
        let device = init_cpu_device();
        let config = ModelConfig::dev().with_path_scoring(mode);
        let tables = Arc::new(random_tables(&config, 12, 5, 7));
        PathScorer::new(&config, tables, &device).expect("matching widths")
    }

    fn path(entities: Vec<u32>, relations: Vec<u32>) -> ReasoningPath {
        ReasoningPath {
            entities,
            relations,
        }
    }

    #[test]
    fn test_sentinel_and_empty_score_zero() {
        let scorer = scorer(PathScoringMode::NodeRelation);
        for paths in [PairPaths::NoOverlap, PairPaths::Found(Vec::new())] {
            let score = scorer.score_pair(&paths);
            assert_eq!(to_host_f32(score.total), vec![0.0]);
            assert!(score.per_path.is_empty());
        }
    }

    #[test]
    fn test_node_relation_scores_are_bounded_and_summed() {
        let scorer = scorer(PathScoringMode::NodeRelation);
        let paths = PairPaths::Found(vec![
            path(vec![3], vec![0]),
            path(vec![3, 4, 5], vec![0, 2, 1]),
        ]);
        let score = scorer.score_pair(&paths);

        assert_eq!(score.per_path.len(), 2);
        assert!(score.per_path.iter().all(|&s| (0.0..=1.0).contains(&s)));
        let total = to_host_f32(score.total)[0];
        assert!((total - score.per_path.iter().sum::<f32>()).abs() < 1e-5);
    }

    #[test]
    fn test_node_only_ignores_relations() {
        let scorer = scorer(PathScoringMode::NodeOnly);
        let a = to_host_f32(scorer.score_path(&path(vec![3, 4], vec![0, 1])));
        let b = to_host_f32(scorer.score_path(&path(vec![3, 4], vec![0, 4])));
        assert_eq!(a, b);
    }

    #[test]
    fn test_batch_shape() {
        let scorer = scorer(PathScoringMode::NodeRelation);
        let (totals, per_path) = scorer.score_batch(&[
            PairPaths::NoOverlap,
            PairPaths::Found(vec![path(vec![2], vec![0])]),
        ]);
        assert_eq!(totals.dims(), [2]);
        assert_eq!(per_path.iter().map(Vec::len).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(to_host_f32(totals)[0], 0.0);
    }

    #[test]
    #[should_panic(expected = "relations")]
    fn test_misaligned_path_panics() {
        scorer(PathScoringMode::NodeRelation).score_path(&path(vec![3, 4], vec![0]));
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let device = init_cpu_device();
        let config = ModelConfig::dev();
        let tables = Arc::new(random_tables(&config, 4, 4, 1));
        let wrong = ModelConfig {
            entity_embedding_size: config.entity_embedding_size + 1,
            ..config
        };
        assert!(PathScorer::<CpuBackend>::new(&wrong, tables, &device).is_err());
    }
}
