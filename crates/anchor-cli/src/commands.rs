//! Subcommand implementations for `anchor-reason`.
//!
//! Each `run_*` function returns plain serializable records; `main` decides
//! where the JSON goes.

use anchor_core::config::{ArtifactArgs, ArtifactPaths, ModelConfig, PathScoringMode, ANCHOR_LAYERS};
use anchor_core::cooccurrence::{CoClickConfig, CoClickMiner, WeightedPair};
use anchor_core::ids::ItemId;
use anchor_core::loader::{load_doc_features, load_knowledge_artifacts, KnowledgeArtifacts};
use anchor_core::tables::NeighborTable;
use anchor_core::{load_kg_triples, to_host_f32};
use anchor_graph::{AnchorSample, PairBatch};
use anchor_models::{PairTrace, Reasoner, Recommender};
use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ReasonArgs {
    /// JSON pair batch
    #[arg(long)]
    pub batch: PathBuf,

    /// Override the maximum path length (edges)
    #[arg(long)]
    pub max_path_edges: Option<usize>,

    /// Score paths from entity embeddings only
    #[arg(long)]
    pub node_only: bool,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RecommendArgs {
    /// JSON pair batch
    #[arg(long)]
    pub batch: PathBuf,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MinePairsArgs {
    /// JSON object mapping user IDs to clicked item IDs
    #[arg(long)]
    pub histories: PathBuf,

    /// Items need more clicks than this
    #[arg(long, default_value = "10")]
    pub min_item_clicks: usize,

    /// Pairs need a co-click weight above this
    #[arg(long, default_value = "0.05")]
    pub min_weight: f64,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One recommender prediction.
#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    pub item1: ItemId,
    pub item2: ItemId,
    pub prediction: f32,
}

// =============================================================================
// Commands
// =============================================================================

/// Run the path reasoner over a batch file.
pub fn run_reason<B: Backend>(args: &ReasonArgs, device: &B::Device) -> Result<Vec<PairTrace>> {
    let paths = ArtifactPaths::from_args(args.artifacts.clone());
    let mut config = paths.model_config()?;
    if let Some(max_path_edges) = args.max_path_edges {
        config.max_path_edges = max_path_edges;
    }
    if args.node_only {
        config = config.with_path_scoring(PathScoringMode::NodeOnly);
    }

    let batch = read_batch(&args.batch, &config)?;
    let knowledge = load_knowledge_artifacts::<B>(paths.knowledge_file(), device)?;

    let reasoner = Reasoner::new(config, Arc::new(knowledge.embeddings), device)?;
    let output = reasoner.forward(&batch);
    tracing::info!(
        pairs = output.traces.len(),
        with_paths = output.traces.iter().filter(|t| !t.path_scores.is_empty()).count(),
        "Reasoned over pair batch"
    );
    Ok(output.traces)
}

/// Run the neighbor-aggregation recommender over a batch file.
pub fn run_recommend<B: Backend>(
    args: &RecommendArgs,
    device: &B::Device,
) -> Result<Vec<Recommendation>> {
    let paths = ArtifactPaths::from_args(args.artifacts.clone());
    let config = paths.model_config()?;
    let batch = read_batch(&args.batch, &config)?;

    let knowledge = load_knowledge_artifacts::<B>(paths.knowledge_file(), device)?;
    let neighbors = resolve_neighbors(&paths, &config, &knowledge)?;
    let docs = load_doc_features::<B>(paths.doc_feature_file(), device)?;

    let recommender = Recommender::new(
        config,
        Arc::new(knowledge.embeddings),
        Arc::new(neighbors),
        Arc::new(docs),
        device,
    )?;
    let output = recommender.forward(&batch)?;
    let predictions = to_host_f32(output.predictions);

    Ok(batch
        .item1
        .iter()
        .zip(&batch.item2)
        .zip(predictions)
        .map(|((item1, item2), prediction)| Recommendation {
            item1: item1.clone(),
            item2: item2.clone(),
            prediction,
        })
        .collect())
}

/// Mine co-click positive pairs from a history file.
pub fn run_mine_pairs(args: &MinePairsArgs) -> Result<Vec<WeightedPair>> {
    let contents = fs::read_to_string(&args.histories)
        .with_context(|| format!("Failed to read {:?}", args.histories))?;
    let histories: BTreeMap<String, Vec<ItemId>> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse click histories in {:?}", args.histories))?;

    let mut miner = CoClickMiner::new();
    for (user, items) in &histories {
        miner.record_history(user, items.iter().map(String::as_str));
    }

    let config = CoClickConfig {
        min_item_clicks: args.min_item_clicks,
        min_weight: args.min_weight,
    };
    let pairs = miner.positive_pairs(&config);
    tracing::info!(users = miner.n_users(), pairs = pairs.len(), "Mined positive pairs");
    Ok(pairs)
}

/// Serialize `value` as pretty JSON to `output`, or stdout when `None`.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!(path = ?path, "Wrote output");
        }
        None => println!("{}", json),
    }
    Ok(())
}

// =============================================================================
// Inputs
// =============================================================================

/// Read a pair batch and check it against the model's anchor shape.
pub fn read_batch(path: &Path, config: &ModelConfig) -> Result<PairBatch> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let batch: PairBatch = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse pair batch in {:?}", path))?;
    validate_batch(&batch, config).with_context(|| format!("Invalid pair batch in {:?}", path))?;
    Ok(batch)
}

/// Turn the shape contracts the models assert on into recoverable errors.
pub fn validate_batch(batch: &PairBatch, config: &ModelConfig) -> Result<()> {
    anyhow::ensure!(!batch.is_empty(), "Batch has no pairs");
    anyhow::ensure!(
        batch.item1.len() == batch.item2.len(),
        "Batch has {} item1 ids but {} item2 ids",
        batch.item1.len(),
        batch.item2.len()
    );
    validate_sample(&batch.anchors1, batch.len(), config).context("anchors1")?;
    validate_sample(&batch.anchors2, batch.len(), config).context("anchors2")?;
    Ok(())
}

fn validate_sample(sample: &AnchorSample, batch: usize, config: &ModelConfig) -> Result<()> {
    let widths = config.layer_widths();
    anyhow::ensure!(
        sample.entities.len() == ANCHOR_LAYERS,
        "Expected {} entity layers, got {}",
        ANCHOR_LAYERS,
        sample.entities.len()
    );
    anyhow::ensure!(
        sample.relations.is_empty() || sample.relations.len() == ANCHOR_LAYERS,
        "Expected 0 or {} relation layers, got {}",
        ANCHOR_LAYERS,
        sample.relations.len()
    );

    for hop in 0..ANCHOR_LAYERS {
        let entities = &sample.entities[hop];
        anyhow::ensure!(
            entities.len() == batch,
            "Entity layer {} has {} items, expected {}",
            hop,
            entities.len(),
            batch
        );
        for (item, slots) in entities.iter().enumerate() {
            anyhow::ensure!(
                slots.len() == widths[hop],
                "Item {} has {} slots in layer {}, topk {:?} requires {}",
                item,
                slots.len(),
                hop,
                config.topk,
                widths[hop]
            );
        }

        let Some(relations) = sample.relations.get(hop) else {
            continue;
        };
        anyhow::ensure!(
            relations.len() == batch,
            "Relation layer {} has {} items, expected {}",
            hop,
            relations.len(),
            batch
        );
        for (item, slots) in relations.iter().enumerate() {
            anyhow::ensure!(
                slots.is_empty() || slots.len() == widths[hop],
                "Item {} has {} relation slots in layer {}, expected {}",
                item,
                slots.len(),
                hop,
                widths[hop]
            );
        }
    }
    Ok(())
}

/// Neighbor table from `--kg-triples` if given, else from the knowledge file.
fn resolve_neighbors<B: Backend>(
    paths: &ArtifactPaths,
    config: &ModelConfig,
    knowledge: &KnowledgeArtifacts<B>,
) -> Result<NeighborTable> {
    if let Some(triples_path) = paths.kg_triples_file() {
        let triples = load_kg_triples(triples_path)?;
        let table = NeighborTable::from_triples(
            &triples,
            knowledge.embeddings.n_entities(),
            config.neighbor_slots,
        )
        .with_context(|| format!("Invalid triples in {:?}", triples_path))?;
        tracing::info!(triples = triples.len(), slots = table.slots(), "Built neighbor table");
        return Ok(table);
    }

    knowledge.neighbors.clone().with_context(|| {
        format!(
            "{:?} has no neighbor tables; pass --kg-triples",
            paths.knowledge_file()
        )
    })
}
