use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{NnError, Result};

/// Inverted dropout. Active only in the training-time `forward` path; `infer`
/// is the identity, so a trained model needs no output rescaling.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    mask: Array2<f32>,
    rng: StdRng,
}

impl Dropout {
    /// Creates a new `Dropout` layer.
    ///
    /// # Args
    /// * `p` - Probability of zeroing each unit, in `[0, 1)`.
    /// * `seed` - Seed for the layer's own mask generator.
    ///
    /// # Errors
    /// Returns `NnError::InvalidLayer` if `p` is outside `[0, 1)`.
    pub fn new(p: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(NnError::InvalidLayer {
                what: "dropout",
                msg: "drop probability must be in [0, 1)",
            });
        }

        Ok(Self {
            p,
            mask: Array2::zeros((0, 0)),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn forward(&mut self, x: Array2<f32>) -> Result<Array2<f32>> {
        let keep = 1.0 - self.p;
        let rng = &mut self.rng;
        let mask = Array2::from_shape_simple_fn(x.raw_dim(), || {
            if rng.random::<f32>() < keep { 1.0 / keep } else { 0.0 }
        });

        self.mask = mask;
        Ok(x * &self.mask)
    }

    pub fn infer(&self, x: Array2<f32>) -> Result<Array2<f32>> {
        Ok(x)
    }

    pub fn backward(&mut self, d: Array2<f32>) -> Result<Array2<f32>> {
        Ok(d * &self.mask)
    }
}
