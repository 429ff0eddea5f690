//! # anchor-core
//!
//! Shared foundation for anchor-graph news-pair relevance models.
//!
//! - [`ids`]: entity / relation / item identifiers and the `0` padding sentinel
//! - [`backend`]: backend aliases and host <-> tensor helpers
//! - [`config`]: [`ModelConfig`] (TOML) and [`ArtifactPaths`] (CLI > env > file > defaults)
//! - [`tables`]: [`KnowledgeEmbeddings`], [`NeighborTable`], [`DocFeatures`]
//! - [`loader`]: SafeTensors artifact loading
//! - [`adjacency`]: neighbor tables from `(head, relation, tail)` triples
//! - [`cooccurrence`]: co-click positive pair mining
//!
//! The tables are read-only once loaded. Models receive them as
//! `Arc<KnowledgeEmbeddings<B>>` at construction; there is no global state.
//!
//! ```rust,ignore
//! use anchor_core::{init_cpu_device, load_knowledge_artifacts, CpuBackend};
//!
//! let device = init_cpu_device();
//! let artifacts = load_knowledge_artifacts::<CpuBackend>(&path, &device)?;
//! let tables = Arc::new(artifacts.embeddings);
//! ```

pub mod adjacency;
pub mod backend;
pub mod config;
pub mod cooccurrence;
pub mod ids;
pub mod loader;
pub mod tables;

pub use adjacency::*;
pub use backend::*;
pub use config::*;
pub use cooccurrence::*;
pub use ids::*;
pub use loader::*;
pub use tables::*;
