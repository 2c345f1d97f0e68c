use ndarray::{Array2, ArrayView2};

/// A differentiable loss over a batch of predictions.
pub trait LossFn {
    /// Scalar loss for the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;

    /// dL/dy_pred, same shape as `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}

/// Smooth absolute-error (Huber) loss, mean-reduced over all elements.
///
/// Quadratic within `delta` of the target, linear outside, which keeps
/// outliers from dominating the gradient.
#[derive(Debug, Clone, Copy)]
pub struct SmoothL1 {
    delta: f32,
}

impl SmoothL1 {
    pub fn new(delta: f32) -> Self {
        Self { delta }
    }

    /// Loss of a single error term.
    #[inline]
    pub fn value(&self, e: f32) -> f32 {
        let a = e.abs();
        if a <= self.delta {
            0.5 * e * e / self.delta
        } else {
            a - 0.5 * self.delta
        }
    }

    /// Derivative of a single error term.
    #[inline]
    pub fn derivative(&self, e: f32) -> f32 {
        (e / self.delta).clamp(-1.0, 1.0)
    }
}

impl LossFn for SmoothL1 {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.len() as f32;
        (&y_pred - &y).mapv(|e| self.value(e)).sum() / n
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len() as f32;
        (&y_pred - &y).mapv(|e| self.derivative(e) / n)
    }
}
