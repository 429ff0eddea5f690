//! # anchor-cli
//!
//! Library half of the `anchor-reason` binary, split out so the commands can
//! be driven from integration tests.
//!
//! | Subcommand | Inputs | Output |
//! |------------|--------|--------|
//! | `reason` | pair batch, knowledge file | [`PairTrace`](anchor_models::PairTrace) per pair |
//! | `recommend` | pair batch, knowledge file, doc features, optional triples | [`Recommendation`] per pair |
//! | `mine-pairs` | `{ "user": ["item", ...] }` | weighted positive pairs |

pub mod commands;

pub use commands::*;
