//! Small building blocks shared by the reasoner and the recommender.
//!
//! ```text
//! Compress:     x ──► Linear(d_in, d) ──► tanh
//! FeedForward:  x ──► Linear(d_in, d_hidden) ──► ELU ──► Linear(d_hidden, d_out)
//! ```
//!
//! Each model owns its own instances; nothing here is shared by reference.

use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Exponential linear unit with `alpha = 1`.
///
/// `elu(x) = x` for `x > 0`, `exp(x) - 1` otherwise.
pub fn elu<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let positive = x.clone().clamp_min(0.0);
    let negative = x.clamp_max(0.0).exp() - 1.0;
    positive + negative
}

/// Linear projection followed by `tanh`.
#[derive(Debug)]
pub struct Compress<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> Compress<B> {
    pub fn new(d_input: usize, d_output: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(d_input, d_output).init(device),
        }
    }

    /// Project the last dimension.
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.linear.forward(x).tanh()
    }
}

/// Two linear layers with an ELU in between; no output activation.
#[derive(Debug)]
pub struct FeedForward<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn new(d_input: usize, d_hidden: usize, d_output: usize, device: &B::Device) -> Self {
        Self {
            hidden: LinearConfig::new(d_input, d_hidden).init(device),
            output: LinearConfig::new(d_hidden, d_output).init(device),
        }
    }

    /// Apply to the last dimension.
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.output.forward(elu(self.hidden.forward(x)))
    }
}
