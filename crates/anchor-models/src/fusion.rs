//! Fusion of the path score and the overlap count into one relevance score.
//!
//! ```text
//! denom   = ln(e + size1 + size2)
//! quality = tanh(path_score / denom)
//! novelty = tanh(overlap    / denom)
//! score   = 0.8 * quality + 0.2 * novelty        ∈ [-1, 1]
//! ```
//!
//! The weights and the denominator are fixed constants, not parameters.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Weight of the path-quality term.
pub const QUALITY_WEIGHT: f32 = 0.8;
/// Weight of the overlap-novelty term.
pub const NOVELTY_WEIGHT: f32 = 0.2;

/// Fuse per-pair scores; every input is `[batch]`.
pub fn fuse_scores<B: Backend>(
    path_score: Tensor<B, 1>,
    overlap: Tensor<B, 1>,
    size1: Tensor<B, 1>,
    size2: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let denom = (size1 + size2 + std::f32::consts::E).log();
    let quality = (path_score / denom.clone()).tanh();
    let novelty = (overlap / denom).tanh();
    quality * QUALITY_WEIGHT + novelty * NOVELTY_WEIGHT
}

/// Host-side version of [`fuse_scores`] for a single pair.
pub fn fuse_score(path_score: f32, overlap: usize, size1: usize, size2: usize) -> f32 {
    let denom = (std::f32::consts::E + size1 as f32 + size2 as f32).ln();
    QUALITY_WEIGHT * (path_score / denom).tanh() + NOVELTY_WEIGHT * (overlap as f32 / denom).tanh()
}
