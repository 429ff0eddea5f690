//! Model and artifact configuration.
//!
//! Two layers live here:
//! - [`ModelConfig`]: the network shape (`embedding_size`, `topk`, ...),
//!   read from TOML.
//! - [`ArtifactPaths`]: where the pretrained tables and document features
//!   live on disk.
//!
//! Artifact paths can be configured via:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`ANCHOR_*`)
//! 3. Config file (`~/.config/anchor-reason/config.toml`, `[artifacts]` table)
//! 4. Default system directories
//!
//! # Example
//!
//! ```ignore
//! use anchor_core::config::{ArtifactPaths, ModelConfig};
//!
//! let model = ModelConfig::load(Path::new("model.toml"))?;
//! let paths = ArtifactPaths::builder()
//!     .base_dir("/data/anchor")
//!     .build();
//! let knowledge = paths.knowledge_file();
//! ```

use anyhow::{Context, Result};
use clap::Args;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of hop layers in every anchor graph.
pub const ANCHOR_LAYERS: usize = 3;

const APP_NAME: &str = "anchor-reason";
const KNOWLEDGE_FILE: &str = "knowledge.safetensors";
const DOC_FEATURE_FILE: &str = "doc_features.safetensors";

// =============================================================================
// Model Configuration
// =============================================================================

/// How a reasoning path is turned into encoder input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathScoringMode {
    /// Entity embeddings only; the head output is summed unbounded.
    NodeOnly,
    /// Entity + relation embeddings summed per step; head output is
    /// squashed with a sigmoid before summation.
    #[default]
    NodeRelation,
}

/// Network shape shared by the reasoner and the recommender.
///
/// # Example TOML
///
/// ```toml
/// embedding_size = 128
/// entity_embedding_size = 100
/// doc_embedding_size = 768
/// topk = [5, 3, 2]
/// max_path_edges = 5
/// neighbor_slots = 20
/// path_scoring = "node_relation"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Internal projection width.
    pub embedding_size: usize,
    /// Width of the pretrained entity/relation tables.
    pub entity_embedding_size: usize,
    /// Width of the external document feature vectors.
    pub doc_embedding_size: usize,
    /// Branching factor per hop layer.
    pub topk: [usize; ANCHOR_LAYERS],
    /// Maximum edge count of an enumerated path (item and entity edges both count).
    pub max_path_edges: usize,
    /// Fixed neighbor slots per entity in the adjacency tables.
    pub neighbor_slots: usize,
    /// Path encoder input variant.
    pub path_scoring: PathScoringMode,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_size: 128,
            entity_embedding_size: 100,
            doc_embedding_size: 768,
            topk: [5, 3, 2],
            max_path_edges: 5,
            neighbor_slots: 20,
            path_scoring: PathScoringMode::NodeRelation,
        }
    }
}

impl ModelConfig {
    /// Small shapes for tests and demos.
    pub fn dev() -> Self {
        Self {
            embedding_size: 8,
            entity_embedding_size: 6,
            doc_embedding_size: 12,
            topk: [2, 2, 2],
            max_path_edges: 5,
            neighbor_slots: 4,
            path_scoring: PathScoringMode::NodeRelation,
        }
    }

    /// Read and validate a TOML model config.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse model config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject shapes no model can be built from.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.embedding_size > 0, "embedding_size must be positive");
        anyhow::ensure!(
            self.entity_embedding_size > 0,
            "entity_embedding_size must be positive"
        );
        anyhow::ensure!(
            self.doc_embedding_size > 0,
            "doc_embedding_size must be positive"
        );
        anyhow::ensure!(
            self.topk.iter().all(|&k| k > 0),
            "every topk entry must be positive, got {:?}",
            self.topk
        );
        anyhow::ensure!(self.max_path_edges >= 2, "max_path_edges must be at least 2");
        anyhow::ensure!(self.neighbor_slots > 0, "neighbor_slots must be positive");
        Ok(())
    }

    pub fn with_topk(mut self, topk: [usize; ANCHOR_LAYERS]) -> Self {
        self.topk = topk;
        self
    }

    pub fn with_path_scoring(mut self, mode: PathScoringMode) -> Self {
        self.path_scoring = mode;
        self
    }

    pub fn with_embedding_size(mut self, embedding_size: usize) -> Self {
        self.embedding_size = embedding_size;
        self
    }

    /// Slot count of each hop layer: `[k0, k0*k1, k0*k1*k2]`.
    pub fn layer_widths(&self) -> [usize; ANCHOR_LAYERS] {
        let [k0, k1, k2] = self.topk;
        [k0, k0 * k1, k0 * k1 * k2]
    }

    /// Total node slots of one anchor graph across all layers.
    pub fn anchor_nodes(&self) -> usize {
        self.layer_widths().iter().sum()
    }
}

// =============================================================================
// Artifact Paths
// =============================================================================

/// CLI arguments for artifact locations.
///
/// Meant to be `#[command(flatten)]`ed into a binary's own parser.
#[derive(Args, Debug, Clone, Default)]
pub struct ArtifactArgs {
    /// SafeTensors file with entity/relation embeddings and neighbor tables
    #[arg(long, env = "ANCHOR_KNOWLEDGE")]
    pub knowledge: Option<PathBuf>,

    /// SafeTensors file with per-item document features
    #[arg(long, env = "ANCHOR_DOC_FEATURES")]
    pub doc_features: Option<PathBuf>,

    /// Tab-separated `head relation tail` triples used to build neighbor tables
    #[arg(long, env = "ANCHOR_KG_TRIPLES")]
    pub kg_triples: Option<PathBuf>,

    /// TOML model config
    #[arg(long, env = "ANCHOR_MODEL_CONFIG")]
    pub model_config: Option<PathBuf>,

    /// Base directory holding the default artifact file names
    #[arg(long, env = "ANCHOR_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Path to config file
    #[arg(long, env = "ANCHOR_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

/// `[artifacts]` table of the config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArtifactConfigFile {
    pub knowledge: Option<PathBuf>,
    pub doc_features: Option<PathBuf>,
    pub kg_triples: Option<PathBuf>,
    pub model_config: Option<PathBuf>,
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    artifacts: ArtifactConfigFile,
}

/// Resolved artifact locations.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    knowledge: PathBuf,
    doc_features: PathBuf,
    kg_triples: Option<PathBuf>,
    model_config: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Resolve from parsed CLI arguments.
    ///
    /// Priority order:
    /// 1. CLI arguments / environment (clap merges these)
    /// 2. Config file
    /// 3. Default data directory
    pub fn from_args(args: ArtifactArgs) -> Self {
        let file_config = Self::load_config_file(args.config_file.as_deref());

        let base_dir = args
            .base_dir
            .or(file_config.base_dir.clone())
            .unwrap_or_else(Self::default_base_dir);

        Self {
            knowledge: args
                .knowledge
                .or(file_config.knowledge)
                .unwrap_or_else(|| base_dir.join(KNOWLEDGE_FILE)),
            doc_features: args
                .doc_features
                .or(file_config.doc_features)
                .unwrap_or_else(|| base_dir.join(DOC_FEATURE_FILE)),
            kg_triples: args.kg_triples.or(file_config.kg_triples),
            model_config: args.model_config.or(file_config.model_config),
        }
    }

    pub fn builder() -> ArtifactPathsBuilder {
        ArtifactPathsBuilder::default()
    }

    pub fn knowledge_file(&self) -> &Path {
        &self.knowledge
    }

    pub fn doc_feature_file(&self) -> &Path {
        &self.doc_features
    }

    pub fn kg_triples_file(&self) -> Option<&Path> {
        self.kg_triples.as_deref()
    }

    pub fn model_config_file(&self) -> Option<&Path> {
        self.model_config.as_deref()
    }

    /// Load the model config if one is configured, else the defaults.
    pub fn model_config(&self) -> Result<ModelConfig> {
        match &self.model_config {
            Some(path) => ModelConfig::load(path),
            None => Ok(ModelConfig::default()),
        }
    }

    fn default_base_dir() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            proj_dirs.data_dir().to_path_buf()
        } else {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            cwd.join(".anchor-reason")
        }
    }

    fn load_config_file(path: Option<&Path>) -> ArtifactConfigFile {
        let config_path = path.map(PathBuf::from).or_else(|| {
            ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
        });

        let Some(path) = config_path else {
            return ArtifactConfigFile::default();
        };
        if !path.exists() {
            return ArtifactConfigFile::default();
        }

        match fs::read_to_string(&path).map(|s| toml::from_str::<ConfigFile>(&s)) {
            Ok(Ok(config)) => config.artifacts,
            Ok(Err(err)) => {
                tracing::warn!(path = ?path, %err, "Ignoring malformed config file");
                ArtifactConfigFile::default()
            }
            Err(err) => {
                tracing::warn!(path = ?path, %err, "Could not read config file");
                ArtifactConfigFile::default()
            }
        }
    }
}

/// Builder for [`ArtifactPaths`].
#[derive(Debug, Clone, Default)]
pub struct ArtifactPathsBuilder {
    knowledge: Option<PathBuf>,
    doc_features: Option<PathBuf>,
    kg_triples: Option<PathBuf>,
    model_config: Option<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl ArtifactPathsBuilder {
    pub fn knowledge<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.knowledge = Some(path.into());
        self
    }

    pub fn doc_features<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.doc_features = Some(path.into());
        self
    }

    pub fn kg_triples<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.kg_triples = Some(path.into());
        self
    }

    pub fn model_config<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_config = Some(path.into());
        self
    }

    /// Directory holding `knowledge.safetensors` and `doc_features.safetensors`.
    pub fn base_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    pub fn build(self) -> ArtifactPaths {
        let base = self
            .base_dir
            .unwrap_or_else(ArtifactPaths::default_base_dir);

        ArtifactPaths {
            knowledge: self.knowledge.unwrap_or_else(|| base.join(KNOWLEDGE_FILE)),
            doc_features: self
                .doc_features
                .unwrap_or_else(|| base.join(DOC_FEATURE_FILE)),
            kg_triples: self.kg_triples,
            model_config: self.model_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_widths() {
        let config = ModelConfig::default();
        assert_eq!(config.layer_widths(), [5, 15, 30]);
        assert_eq!(config.anchor_nodes(), 50);
    }

    #[test]
    fn test_validate_rejects_zero_topk() {
        let config = ModelConfig::default().with_topk([5, 0, 2]);
        assert!(config.validate().is_err());
        assert!(ModelConfig::dev().validate().is_ok());
        assert!(ModelConfig::dev().with_embedding_size(0).validate().is_err());
    }

    #[test]
    fn test_toml_partial_overrides() {
        let config: ModelConfig = toml::from_str(
            r#"
            embedding_size = 64
            topk = [4, 2, 1]
            path_scoring = "node_only"
            "#,
        )
        .expect("parse toml");

        assert_eq!(config.embedding_size, 64);
        assert_eq!(config.topk, [4, 2, 1]);
        assert_eq!(config.path_scoring, PathScoringMode::NodeOnly);
        assert_eq!(config.doc_embedding_size, 768);
    }

    #[test]
    fn test_builder_base_dir() {
        let paths = ArtifactPaths::builder().base_dir("/data/anchor").build();
        assert_eq!(
            paths.knowledge_file(),
            Path::new("/data/anchor/knowledge.safetensors")
        );
        assert_eq!(
            paths.doc_feature_file(),
            Path::new("/data/anchor/doc_features.safetensors")
        );
        assert!(paths.kg_triples_file().is_none());
    }

    #[test]
    fn test_cli_beats_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("config.toml");
        fs::write(
            &file,
            "[artifacts]\nknowledge = \"/from/file.safetensors\"\nbase_dir = \"/file/base\"\n",
        )
        .expect("write config");

        let paths = ArtifactPaths::from_args(ArtifactArgs {
            doc_features: Some(PathBuf::from("/cli/docs.safetensors")),
            config_file: Some(file),
            ..Default::default()
        });

        assert_eq!(paths.knowledge_file(), Path::new("/from/file.safetensors"));
        assert_eq!(paths.doc_feature_file(), Path::new("/cli/docs.safetensors"));
    }

    #[test]
    fn test_model_config_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("model.toml");
        let config = ModelConfig::dev().with_path_scoring(PathScoringMode::NodeOnly);
        fs::write(&file, toml::to_string_pretty(&config).expect("serialize")).expect("write");

        let loaded = ModelConfig::load(&file).expect("load");
        assert_eq!(loaded, config);
    }
}
