//! # anchor-graph
//!
//! Host-side graph stages of the anchor-graph reasoner.
//!
//! - [`anchor`]: regroup sampler output into per-item [`AnchorGraph`]s
//! - [`overlap`]: shared-entity counts and anchor-graph sizes ([`OverlapStats`])
//! - [`subgraph`]: per-pair undirected multigraph ([`PairSubgraph`])
//! - [`paths`]: bounded simple-path enumeration ([`PathEnumerator`], [`PairPaths`])
//! - [`batch`]: [`PairBatch`] and [`trace_pairs`], which chains the stages
//!
//! Everything here is sequential per pair and independent across pairs.
//! Only [`OverlapStats`] touches the tensor backend.

pub mod anchor;
pub mod batch;
pub mod overlap;
pub mod paths;
pub mod subgraph;

pub use anchor::*;
pub use batch::*;
pub use overlap::*;
pub use paths::*;
pub use subgraph::*;
