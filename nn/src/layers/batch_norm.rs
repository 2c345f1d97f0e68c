use ndarray::{Array1, Array2, Axis};

use crate::{NnError, Result};

const MOMENTUM: f32 = 0.1;
const EPS: f32 = 1e-5;

/// Per-feature batch normalization.
///
/// Parameters (gamma then beta, `2 * dim` scalars) live in the flat parameter
/// buffer like any other layer. The running mean/variance used by `infer` are
/// layer state, exported and restored through `state`/`load_state` so a
/// checkpoint reproduces inference exactly.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    dim: usize,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Backward metadata
    x_hat: Array2<f32>,
    inv_std: Array1<f32>,
}

impl BatchNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            x_hat: Array2::zeros((0, 0)),
            inv_std: Array1::zeros(0),
        }
    }

    /// gamma and beta.
    pub fn param_len(&self) -> usize {
        2 * self.dim
    }

    /// gamma starts at one, beta at zero.
    pub fn init_params(&self, params: &mut [f32]) -> Result<()> {
        if params.len() != self.param_len() {
            return Err(NnError::ParamLengthMismatch {
                got: params.len(),
                expected: self.param_len(),
            });
        }

        let (gamma, beta) = params.split_at_mut(self.dim);
        gamma.fill(1.0);
        beta.fill(0.0);
        Ok(())
    }

    fn check(&self, params: &[f32], x: &Array2<f32>) -> Result<()> {
        if params.len() != self.param_len() {
            return Err(NnError::ParamLengthMismatch {
                got: params.len(),
                expected: self.param_len(),
            });
        }
        if x.nrows() == 0 {
            return Err(NnError::EmptyBatch);
        }
        if x.ncols() != self.dim {
            return Err(NnError::ShapeMismatch {
                what: "batch norm input",
                got: x.ncols(),
                expected: self.dim,
            });
        }
        Ok(())
    }

    /// Normalizes with batch statistics and updates the running estimates.
    pub fn forward(&mut self, params: &[f32], x: Array2<f32>) -> Result<Array2<f32>> {
        self.check(params, &x)?;
        let (gamma, beta) = params.split_at(self.dim);
        let gamma = Array1::from_iter(gamma.iter().copied());
        let beta = Array1::from_iter(beta.iter().copied());

        let mean = x.mean_axis(Axis(0)).ok_or(NnError::EmptyBatch)?;
        let centered = &x - &mean;
        let var = centered.mapv(|c| c * c).mean_axis(Axis(0)).ok_or(NnError::EmptyBatch)?;

        self.inv_std = var.mapv(|v| 1.0 / (v + EPS).sqrt());
        self.x_hat = centered * &self.inv_std;

        self.running_mean = &self.running_mean * (1.0 - MOMENTUM) + &mean * MOMENTUM;
        self.running_var = &self.running_var * (1.0 - MOMENTUM) + &var * MOMENTUM;

        Ok(&self.x_hat * &gamma + &beta)
    }

    /// Normalizes with the running statistics. Pure.
    pub fn infer(&self, params: &[f32], x: Array2<f32>) -> Result<Array2<f32>> {
        self.check(params, &x)?;
        let (gamma, beta) = params.split_at(self.dim);
        let gamma = Array1::from_iter(gamma.iter().copied());
        let beta = Array1::from_iter(beta.iter().copied());

        let inv_std = self.running_var.mapv(|v| 1.0 / (v + EPS).sqrt());
        let x_hat = (&x - &self.running_mean) * &inv_std;
        Ok(&x_hat * &gamma + &beta)
    }

    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<Array2<f32>> {
        if grad.len() != self.param_len() {
            return Err(NnError::ParamLengthMismatch {
                got: grad.len(),
                expected: self.param_len(),
            });
        }

        let (gamma_raw, _) = params.split_at(self.dim);
        let gamma = Array1::from_iter(gamma_raw.iter().copied());

        let d_gamma = (&d * &self.x_hat).sum_axis(Axis(0));
        let d_beta = d.sum_axis(Axis(0));
        {
            let (g_gamma, g_beta) = grad.split_at_mut(self.dim);
            for (g, dg) in g_gamma.iter_mut().zip(d_gamma.iter()) {
                *g += dg;
            }
            for (g, db) in g_beta.iter_mut().zip(d_beta.iter()) {
                *g += db;
            }
        }

        // dx = inv_std / m * (m * dxhat - sum(dxhat) - xhat * sum(dxhat * xhat))
        let m = d.nrows() as f32;
        let d_xhat = &d * &gamma;
        let sum_d_xhat = d_xhat.sum_axis(Axis(0));
        let sum_d_xhat_xhat = (&d_xhat * &self.x_hat).sum_axis(Axis(0));

        let dx = (d_xhat * m - &sum_d_xhat - &self.x_hat * &sum_d_xhat_xhat) * &self.inv_std / m;
        Ok(dx)
    }

    /// Exports the running statistics as `(mean, var)`.
    pub fn state(&self) -> (Vec<f32>, Vec<f32>) {
        (self.running_mean.to_vec(), self.running_var.to_vec())
    }

    /// Restores previously exported running statistics.
    pub fn load_state(&mut self, mean: &[f32], var: &[f32]) -> Result<()> {
        if mean.len() != self.dim || var.len() != self.dim {
            return Err(NnError::ShapeMismatch {
                what: "batch norm state",
                got: mean.len().max(var.len()),
                expected: self.dim,
            });
        }

        self.running_mean = Array1::from_iter(mean.iter().copied());
        self.running_var = Array1::from_iter(var.iter().copied());
        Ok(())
    }
}
