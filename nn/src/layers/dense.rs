use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg};
use rand::Rng;

use crate::init::WeightInit;
use crate::{NnError, Result};

/// A fully connected layer viewing its weights and biases inside a flat
/// parameter slice. Layout: `dim.0 * dim.1` weights followed by `dim.1`
/// biases.
///
/// `forward` caches the input batch for the subsequent `backward`; `infer`
/// allocates nothing persistent and never mutates the layer.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    init: WeightInit,

    // Forward metadata
    x: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Args
    /// * `dim` - `(inputs, outputs)` of the layer.
    /// * `init` - Weight initialization scheme.
    pub fn new(dim: (usize, usize), init: WeightInit) -> Self {
        Self {
            dim,
            init,
            x: Array2::zeros((0, 0)),
        }
    }

    /// Returns the amount of parameters this layer views.
    pub fn param_len(&self) -> usize {
        (self.dim.0 + 1) * self.dim.1
    }

    /// Samples fresh weights into `params` and zeroes the biases.
    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let split = self.dim.0 * self.dim.1;
        if params.len() != self.param_len() {
            return Err(NnError::ParamLengthMismatch {
                got: params.len(),
                expected: self.param_len(),
            });
        }

        let (weights, biases) = params.split_at_mut(split);
        self.init.fill(self.dim.0, self.dim.1, weights, rng)?;
        biases.fill(0.0);
        Ok(())
    }

    /// Gives a view of the raw parameter slice as this layer's weight matrix
    /// and bias vector.
    fn view_params<'p>(&self, params: &'p [f32]) -> Result<(ArrayView2<'p, f32>, ArrayView1<'p, f32>)> {
        if params.len() != self.param_len() {
            return Err(NnError::ParamLengthMismatch {
                got: params.len(),
                expected: self.param_len(),
            });
        }

        let split = self.dim.0 * self.dim.1;
        let w = ArrayView2::from_shape(self.dim, &params[..split])
            .map_err(|_| NnError::ShapeMismatch { what: "weights", got: split, expected: split })?;
        let b = ArrayView1::from_shape(self.dim.1, &params[split..])
            .map_err(|_| NnError::ShapeMismatch { what: "biases", got: params.len() - split, expected: self.dim.1 })?;

        Ok((w, b))
    }

    fn view_grad<'g>(&self, grad: &'g mut [f32]) -> Result<(ArrayViewMut2<'g, f32>, ArrayViewMut1<'g, f32>)> {
        if grad.len() != self.param_len() {
            return Err(NnError::ParamLengthMismatch {
                got: grad.len(),
                expected: self.param_len(),
            });
        }

        let split = self.dim.0 * self.dim.1;
        let (gw, gb) = grad.split_at_mut(split);
        let dw = ArrayViewMut2::from_shape(self.dim, gw)
            .map_err(|_| NnError::ShapeMismatch { what: "weight grads", got: split, expected: split })?;
        let db = ArrayViewMut1::from_shape(self.dim.1, gb)
            .map_err(|_| NnError::ShapeMismatch { what: "bias grads", got: split, expected: self.dim.1 })?;

        Ok((dw, db))
    }

    fn check_input(&self, x: &Array2<f32>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(NnError::EmptyBatch);
        }
        if x.ncols() != self.dim.0 {
            return Err(NnError::ShapeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }
        Ok(())
    }

    /// Training-time forward pass. Caches the input batch.
    pub fn forward(&mut self, params: &[f32], x: Array2<f32>) -> Result<Array2<f32>> {
        self.check_input(&x)?;
        let (w, b) = self.view_params(params)?;

        let mut z = x.dot(&w);
        z += &b;
        self.x = x;

        Ok(z)
    }

    /// Pure forward pass for inference. Identical math, no caching.
    pub fn infer(&self, params: &[f32], x: Array2<f32>) -> Result<Array2<f32>> {
        self.check_input(&x)?;
        let (w, b) = self.view_params(params)?;

        let mut z = x.dot(&w);
        z += &b;
        Ok(z)
    }

    /// Accumulates this layer's gradients and returns the delta for the
    /// previous layer.
    ///
    /// # Args
    /// * `params` - This layer's parameter slice.
    /// * `grad` - This layer's gradient slice, written in place.
    /// * `d` - Incoming delta, shape `(batch, outputs)`.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<Array2<f32>> {
        if d.ncols() != self.dim.1 {
            return Err(NnError::ShapeMismatch {
                what: "dense delta",
                got: d.ncols(),
                expected: self.dim.1,
            });
        }

        {
            let (mut dw, mut db) = self.view_grad(grad)?;
            linalg::general_mat_mul(1.0, &self.x.t(), &d, 1.0, &mut dw);
            db += &d.sum_axis(Axis(0));
        }

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn forward_applies_affine_map() {
        let mut layer = Dense::new((2, 1), WeightInit::KaimingNormal);
        // w = [[2], [3]], b = [0.5]
        let params = [2.0, 3.0, 0.5];

        let y = layer.forward(&params, array![[1.0, 1.0], [2.0, 0.0]]).unwrap();
        assert_eq!(y, array![[5.5], [4.5]]);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer_template = Dense::new((3, 2), WeightInit::KaimingNormal);
        let mut params = vec![0.0; layer_template.param_len()];
        layer_template.init_params(&mut params, &mut rng).unwrap();

        let x = array![[0.3, -0.7, 1.2], [1.1, 0.4, -0.2]];
        // Scalar objective: sum of outputs, so the incoming delta is all ones.
        let objective = |p: &[f32]| -> f32 {
            let layer = Dense::new((3, 2), WeightInit::KaimingNormal);
            layer.infer(p, x.clone()).unwrap().sum()
        };

        let mut layer = layer_template.clone();
        let y = layer.forward(&params, x.clone()).unwrap();
        let mut grad = vec![0.0; params.len()];
        let d = Array2::from_elem(y.raw_dim(), 1.0);
        layer.backward(&params, &mut grad, d).unwrap();

        let eps = 1e-3;
        for i in 0..params.len() {
            let mut bumped = params.clone();
            bumped[i] += eps;
            let numeric = (objective(&bumped) - objective(&params)) / eps;
            assert!(
                (numeric - grad[i]).abs() < 1e-2,
                "param {i}: numeric {numeric} vs analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn rejects_wrong_input_width() {
        let mut layer = Dense::new((2, 1), WeightInit::KaimingNormal);
        let params = [0.0; 3];
        let res = layer.forward(&params, array![[1.0, 2.0, 3.0]]);
        assert!(matches!(res, Err(NnError::ShapeMismatch { .. })));
    }
}
