mod adam;

pub use adam::Adam;

use crate::Result;

/// An optimizer maps accumulated gradients into parameter updates.
pub trait Optimizer {
    /// Applies one update step to `params` given `grads`.
    ///
    /// # Errors
    /// Returns `NnError::ParamLengthMismatch` if the buffers disagree with
    /// the optimizer's state.
    fn step(&mut self, params: &mut [f32], grads: &[f32]) -> Result<()>;

    /// Current learning rate.
    fn learning_rate(&self) -> f32;

    /// Replaces the learning rate (used by plateau schedules).
    fn set_learning_rate(&mut self, lr: f32);
}

/// Clips every gradient value to `[-bound, bound]`.
///
/// Value clipping (not norm clipping) is what keeps penalty terms with
/// near-zero denominators from destabilizing a step.
pub fn clip_values(grads: &mut [f32], bound: f32) {
    for g in grads.iter_mut() {
        *g = g.clamp(-bound, bound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_values_bounds_both_sides() {
        let mut g = [3.0, -7.5, 0.2];
        clip_values(&mut g, 1.0);
        assert_eq!(g, [1.0, -1.0, 0.2]);
    }
}
