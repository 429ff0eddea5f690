//! # anchor-models
//!
//! Learned scorers over anchor graphs.
//!
//! - [`Reasoner`]: path enumeration + [`PathScorer`] + [`fuse_scores`],
//!   prediction in `[-1, 1]` with per-pair [`PairTrace`]s
//! - [`Recommender`]: neighbor-aggregated anchor embeddings + content
//!   features, prediction in `[0, 1]`
//!
//! Both models take the pretrained tables as `Arc`s and keep their own
//! compression layers; nothing is shared mutably.
//!
//! ```rust,ignore
//! use anchor_models::Reasoner;
//!
//! let tables = Arc::new(artifacts.embeddings);
//! let reasoner = Reasoner::<CpuBackend>::new(config, tables, &device)?;
//! let out = reasoner.forward(&batch);
//! for trace in &out.traces {
//!     println!("{} {} {:.4}", trace.item1, trace.item2, trace.prediction);
//! }
//! ```

pub mod fusion;
pub mod layers;
pub mod path_scorer;
pub mod reasoner;
pub mod recommender;
pub mod similarity;

#[cfg(test)]
mod testing;

pub use fusion::*;
pub use layers::*;
pub use path_scorer::*;
pub use reasoner::*;
pub use recommender::*;
pub use similarity::*;
