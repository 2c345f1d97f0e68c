use ndarray::Array2;
use rand::Rng;

use super::{BatchNorm, Dense, Dropout, Relu, Sigmoid};
use crate::Result;
use crate::init::WeightInit;

/// A network layer. Information flows forward when computing an output and
/// backward when computing the deltas of its layers.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Relu(Relu),
    Sigmoid(Sigmoid),
    Dropout(Dropout),
    BatchNorm(BatchNorm),
}

impl Layer {
    pub fn dense(dim: (usize, usize), init: WeightInit) -> Self {
        Self::Dense(Dense::new(dim, init))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn sigmoid() -> Self {
        Self::Sigmoid(Sigmoid::new())
    }

    pub fn dropout(p: f32, seed: u64) -> Result<Self> {
        Ok(Self::Dropout(Dropout::new(p, seed)?))
    }

    pub fn batch_norm(dim: usize) -> Self {
        Self::BatchNorm(BatchNorm::new(dim))
    }

    /// Returns the amount of parameters this layer views in the flat buffer.
    pub fn param_len(&self) -> usize {
        match self {
            Layer::Dense(l) => l.param_len(),
            Layer::BatchNorm(l) => l.param_len(),
            Layer::Relu(_) | Layer::Sigmoid(_) | Layer::Dropout(_) => 0,
        }
    }

    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Layer::Dense(l) => l.init_params(params, rng),
            Layer::BatchNorm(l) => l.init_params(params),
            Layer::Relu(_) | Layer::Sigmoid(_) | Layer::Dropout(_) => Ok(()),
        }
    }

    /// Training-time forward pass; layers cache whatever their backward pass
    /// needs.
    pub fn forward(&mut self, params: &[f32], x: Array2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.forward(params, x),
            Layer::Relu(l) => l.forward(x),
            Layer::Sigmoid(l) => l.forward(x),
            Layer::Dropout(l) => l.forward(x),
            Layer::BatchNorm(l) => l.forward(params, x),
        }
    }

    /// Evaluation-mode forward pass. Pure: no caches, no stochastic masks,
    /// running statistics instead of batch statistics.
    pub fn infer(&self, params: &[f32], x: Array2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.infer(params, x),
            Layer::Relu(l) => l.infer(x),
            Layer::Sigmoid(l) => l.infer(x),
            Layer::Dropout(l) => l.infer(x),
            Layer::BatchNorm(l) => l.infer(params, x),
        }
    }

    /// Accumulates gradients into `grad` and returns the delta for the
    /// previous layer.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.backward(params, grad, d),
            Layer::Relu(l) => l.backward(d),
            Layer::Sigmoid(l) => l.backward(d),
            Layer::Dropout(l) => l.backward(d),
            Layer::BatchNorm(l) => l.backward(params, grad, d),
        }
    }
}
