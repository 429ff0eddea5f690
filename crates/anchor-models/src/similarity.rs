//! Row-wise cosine similarity.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Cosine similarity between matching rows of `a` and `b`.
///
/// Norms are clamped to `1e-8`, so a zero row gives similarity 0.
///
/// # Arguments
/// * `a` - `[batch, dim]`
/// * `b` - `[batch, dim]`
///
/// # Returns
/// `[batch]` similarities in `[-1, 1]`
pub fn cosine_similarity<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 1> {
    let [batch, _] = a.dims();

    // sum_dim(1) keeps the reduced axis: [batch, 1]
    let dot = (a.clone() * b.clone()).sum_dim(1);
    let norm_a = a.powf_scalar(2.0).sum_dim(1).sqrt();
    let norm_b = b.powf_scalar(2.0).sum_dim(1).sqrt();
    let denom = (norm_a * norm_b).clamp_min(1e-8);

    (dot / denom).reshape([batch])
}
