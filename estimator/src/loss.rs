use ndarray::{Array2, ArrayView2};

use nn::loss::{LossFn, SmoothL1};

use crate::config::TrainConfig;

/// Additive epsilon in the ratio penalty's denominator.
///
/// This constant is part of the loss contract: without it the penalty's
/// gradient blows up whenever the cement output approaches zero, which is
/// exactly the regime the scale penalty pushes away from. Gradient value
/// clipping is the second line of defense.
pub const RATIO_EPS: f32 = 1e-6;

/// Output column order used throughout the engine.
const CEMENT: usize = 0;
const SAND: usize = 1;

/// The trainer's composite objective over normalized outputs.
///
/// A plain regression loss lets the optimizer reach low error by predicting
/// degenerate near-zero outputs for under-represented value ranges. The three
/// auxiliary penalties encode prior physical knowledge the regression term
/// cannot express:
/// - `ratio`: pulls the sand/cement output ratio toward the concrete-mix
///   target;
/// - `scale`: pushes every output away from a floor near zero;
/// - `min_sand`: the sand-specific variant, since sand collapses first.
#[derive(Debug, Clone)]
pub struct CompositeLoss {
    output_weights: [f32; 3],
    huber: SmoothL1,
    ratio_target: f32,
    ratio_weight: f32,
    scale_floor: f32,
    scale_weight: f32,
    min_sand: f32,
    min_sand_weight: f32,
}

impl CompositeLoss {
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self {
            output_weights: cfg.output_weights,
            huber: SmoothL1::new(cfg.huber_delta),
            ratio_target: cfg.ratio_target,
            ratio_weight: cfg.ratio_weight,
            scale_floor: cfg.scale_floor,
            scale_weight: cfg.scale_weight,
            min_sand: cfg.min_sand,
            min_sand_weight: cfg.min_sand_weight,
        }
    }

}

impl LossFn for CompositeLoss {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let m = y_pred.nrows() as f32;
        let n = y_pred.len() as f32;

        let mut regression = 0.0;
        let mut scale = 0.0;
        for (row_pred, row) in y_pred.rows().into_iter().zip(y.rows()) {
            for (j, (&p, &t)) in row_pred.iter().zip(row.iter()).enumerate() {
                regression += self.output_weights[j] * self.huber.value(p - t);
                scale += (self.scale_floor - p).max(0.0).powi(2);
            }
        }
        regression /= n;
        scale *= self.scale_weight / n;

        let mut ratio = 0.0;
        let mut sand_floor = 0.0;
        for row in y_pred.rows() {
            let c = row[CEMENT];
            let s = row[SAND];
            let rho = s / (c + RATIO_EPS);
            ratio += (rho - self.ratio_target).powi(2);
            sand_floor += (self.min_sand - s).max(0.0).powi(2);
        }
        ratio *= self.ratio_weight / m;
        sand_floor *= self.min_sand_weight / m;

        regression + ratio + scale + sand_floor
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let m = y_pred.nrows() as f32;
        let n = y_pred.len() as f32;

        let mut d = Array2::zeros(y_pred.raw_dim());
        for i in 0..y_pred.nrows() {
            for j in 0..y_pred.ncols() {
                let p = y_pred[[i, j]];
                let t = y[[i, j]];

                let mut g = self.output_weights[j] * self.huber.derivative(p - t) / n;
                g -= 2.0 * self.scale_weight * (self.scale_floor - p).max(0.0) / n;
                d[[i, j]] = g;
            }

            let c = y_pred[[i, CEMENT]];
            let s = y_pred[[i, SAND]];
            let denom = c + RATIO_EPS;
            let excess = s / denom - self.ratio_target;

            d[[i, SAND]] += 2.0 * self.ratio_weight * excess / denom / m;
            d[[i, CEMENT]] -= 2.0 * self.ratio_weight * excess * s / (denom * denom) / m;
            d[[i, SAND]] -= 2.0 * self.min_sand_weight * (self.min_sand - s).max(0.0) / m;
        }

        d
    }
}
