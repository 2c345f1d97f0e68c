use super::Optimizer;
use crate::{NnError, Result};

/// Adam with decoupled weight decay.
///
/// Keeps first and second moment estimates per parameter; weight decay is
/// applied directly to the parameters rather than folded into the gradient.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    b1: f32,
    b2: f32,
    eps: f32,
    weight_decay: f32,

    m: Vec<f32>,
    v: Vec<f32>,
    t: u64,
}

impl Adam {
    /// Creates a new Adam optimizer for `num_params` parameters.
    ///
    /// # Args
    /// * `num_params` - Length of the flat parameter buffer.
    /// * `lr` - Learning rate.
    /// * `weight_decay` - Decoupled weight decay coefficient.
    pub fn new(num_params: usize, lr: f32, weight_decay: f32) -> Self {
        Self::with_betas(num_params, lr, weight_decay, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(num_params: usize, lr: f32, weight_decay: f32, b1: f32, b2: f32, eps: f32) -> Self {
        Self {
            lr,
            b1,
            b2,
            eps,
            weight_decay,
            m: vec![0.0; num_params],
            v: vec![0.0; num_params],
            t: 0,
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [f32], grads: &[f32]) -> Result<()> {
        if params.len() != self.m.len() || grads.len() != self.m.len() {
            return Err(NnError::ParamLengthMismatch {
                got: params.len().max(grads.len()),
                expected: self.m.len(),
            });
        }

        self.t += 1;
        let bias1 = 1.0 - self.b1.powi(self.t as i32);
        let bias2 = 1.0 - self.b2.powi(self.t as i32);

        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = self.b1 * self.m[i] + (1.0 - self.b1) * g;
            self.v[i] = self.b2 * self.v[i] + (1.0 - self.b2) * g * g;

            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;

            params[i] -= self.lr * (m_hat / (v_hat.sqrt() + self.eps) + self.weight_decay * params[i]);
        }

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_a_quadratic() {
        // Minimize f(p) = (p - 3)^2 from p = 0.
        let mut params = [0.0_f32];
        let mut adam = Adam::new(1, 0.1, 0.0);

        for _ in 0..500 {
            let grads = [2.0 * (params[0] - 3.0)];
            adam.step(&mut params, &grads).unwrap();
        }

        assert!((params[0] - 3.0).abs() < 1e-2, "got {}", params[0]);
    }

    #[test]
    fn weight_decay_shrinks_parameters() {
        let mut params = [10.0_f32];
        let mut adam = Adam::new(1, 0.01, 0.1);

        for _ in 0..100 {
            adam.step(&mut params, &[0.0]).unwrap();
        }

        assert!(params[0] < 10.0);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let mut adam = Adam::new(2, 0.1, 0.0);
        let mut params = [0.0_f32; 3];
        assert!(matches!(
            adam.step(&mut params, &[0.0; 3]),
            Err(NnError::ParamLengthMismatch { .. })
        ));
    }
}
