use std::path::Path;

use log::debug;
use ndarray::Array2;

use nn::Sequential;

use crate::artifact::ModelArtifact;
use crate::encode;
use crate::model;
use crate::sample::{ConstructionType, Estimate, Region, Variant};
use crate::synth::{BRICK_RATE, CEMENT_RATE, SAND_RATE};
use crate::{EstimatorError, Result};

/// A loaded model ready to serve estimates.
///
/// `predict` takes `&self`: inference runs the pure evaluation path, so one
/// `Predictor` can serve concurrent callers behind a shared reference.
pub struct Predictor {
    model: Sequential,
    params: Vec<f32>,
    artifact: ModelArtifact,
}

impl Predictor {
    /// Loads the artifact bundle stored in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_artifact(ModelArtifact::load(dir)?)
    }

    /// Builds a predictor around an in-memory artifact.
    ///
    /// # Errors
    /// `ArtifactCorrupt`-class failures when the parameter buffer or state
    /// tensors do not fit the variant's topology.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        // Dropout is inert at inference; probability and seed are irrelevant.
        let mut model = model::build(artifact.variant, 0.0, 0)?;
        if artifact.params.len() != model.num_params() {
            return Err(EstimatorError::WidthMismatch {
                what: "parameter buffer",
                got: artifact.params.len(),
                expected: model.num_params(),
            });
        }
        model.load_state(&artifact.state)?;

        debug!(
            "loaded {:?} model version {} ({} parameters)",
            artifact.variant,
            artifact.version,
            artifact.params.len()
        );

        Ok(Self { model, params: artifact.params.clone(), artifact })
    }

    pub fn variant(&self) -> Variant {
        self.artifact.variant
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    /// Estimates material quantities for one project.
    ///
    /// Raw model output is post-processed into physically plausible numbers:
    /// nothing is negative, area-only estimates never fall below the base
    /// consumption rates times the area, and categorical estimates have their
    /// cement/sand pair re-balanced to the trained mix ratio.
    ///
    /// # Errors
    /// `InvalidInput` for bad areas, unknown category strings, or categories
    /// missing from a categorical model's request.
    pub fn predict(
        &self,
        area: f32,
        construction_type: Option<&str>,
        region: Option<&str>,
    ) -> Result<Estimate> {
        let construction_type = construction_type
            .map(|s| s.parse::<ConstructionType>())
            .transpose()?;
        let region = region.map(|s| s.parse::<Region>()).transpose()?;

        let features = encode::encode(self.artifact.variant, area, construction_type, region)?;
        let scaled = self.artifact.scaler_x.transform_row(features.view())?;

        let x = scaled
            .into_shape_with_order((1, self.artifact.scaler_x.width()))
            .map_err(|_| EstimatorError::WidthMismatch {
                what: "feature row",
                got: 0,
                expected: self.artifact.scaler_x.width(),
            })?;
        let y: Array2<f32> = self.model.infer(&self.params, x)?;
        let out = self.artifact.scaler_y.inverse_row(y.row(0))?;

        let (mut cement, mut sand, mut bricks) = (out[0], out[1], out[2]);

        match self.artifact.variant {
            Variant::AreaOnly => {
                // The synthetic labels never sit below the base rates by more
                // than their noise band; the model must not either.
                cement = cement.max(CEMENT_RATE * area);
                sand = sand.max(SAND_RATE * area);
                bricks = bricks.max(BRICK_RATE * area);
            }
            Variant::Categorical => {
                // Redistribute the cement+sand total to the trained mix
                // ratio; the network's split drifts, the sum does not.
                let total = cement.max(0.0) + sand.max(0.0);
                let r = self.artifact.ratio_target;
                cement = total / (1.0 + r);
                sand = r * cement;
            }
        }

        Ok(Estimate {
            area,
            construction_type,
            region,
            cimento: cement.max(0.0),
            areia: sand.max(0.0),
            tijolos: bricks.max(0.0).round() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::MinMaxScaler;
    use ndarray::array;

    /// An artifact whose network outputs all zeros, so the inverse transform
    /// returns each label column's fitted minimum. With minimums at zero the
    /// physical floors fully determine the area-only estimate.
    fn zeroed_artifact(variant: Variant) -> ModelArtifact {
        let model = model::build(variant, 0.0, 0).unwrap();
        let (x_fit, state) = match variant {
            Variant::AreaOnly => (array![[1.0], [500.0]], Vec::new()),
            Variant::Categorical => {
                let mut lo = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
                let mut hi = vec![500.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
                let x = Array2::from_shape_vec((2, 7), {
                    let mut v = Vec::new();
                    v.append(&mut lo);
                    v.append(&mut hi);
                    v
                })
                .unwrap();
                // Batch-norm layers sit at positions 1 and 5 of the stack.
                let state = vec![
                    ("layer1.running_mean".to_string(), vec![0.0; 64]),
                    ("layer1.running_var".to_string(), vec![1.0; 64]),
                    ("layer5.running_mean".to_string(), vec![0.0; 32]),
                    ("layer5.running_var".to_string(), vec![1.0; 32]),
                ];
                (x, state)
            }
        };

        ModelArtifact {
            version: "0123456789abcdef".to_string(),
            variant,
            ratio_target: 3.0,
            params: vec![0.0; model.num_params()],
            state,
            scaler_x: MinMaxScaler::fit(x_fit.view()).unwrap(),
            scaler_y: MinMaxScaler::fit(array![[0.0, 0.0, 0.0], [4000.0, 10000.0, 7000.0]].view())
                .unwrap(),
        }
    }

    #[test]
    fn area_only_floors_determine_the_zero_model_estimate() {
        let p = Predictor::from_artifact(zeroed_artifact(Variant::AreaOnly)).unwrap();
        let e = p.predict(10.0, None, None).unwrap();

        assert_eq!(e.cimento, 80.0);
        assert_eq!(e.areia, 200.0);
        assert_eq!(e.tijolos, 140);
    }

    #[test]
    fn floors_scale_linearly_with_area() {
        let p = Predictor::from_artifact(zeroed_artifact(Variant::AreaOnly)).unwrap();
        let small = p.predict(10.0, None, None).unwrap();
        let large = p.predict(20.0, None, None).unwrap();

        assert_eq!(large.cimento, 2.0 * small.cimento);
        assert_eq!(large.areia, 2.0 * small.areia);
        assert_eq!(large.tijolos, 2 * small.tijolos);
    }

    #[test]
    fn categorical_estimate_obeys_the_mix_ratio() {
        let p = Predictor::from_artifact(zeroed_artifact(Variant::Categorical)).unwrap();
        let e = p.predict(120.0, Some("residential"), Some("urban")).unwrap();

        // Sigmoid at zero parameters gives 0.5; the rebalance pins the pair.
        assert!((e.areia - 3.0 * e.cimento).abs() < 1e-2, "cement {} sand {}", e.cimento, e.areia);
    }

    #[test]
    fn bad_inputs_are_rejected_as_invalid() {
        let p = Predictor::from_artifact(zeroed_artifact(Variant::Categorical)).unwrap();

        assert!(p.predict(-1.0, Some("residential"), Some("urban")).unwrap_err().is_invalid_input());
        assert!(p.predict(10.0, Some("castle"), Some("urban")).unwrap_err().is_invalid_input());
        assert!(p.predict(10.0, None, Some("urban")).unwrap_err().is_invalid_input());
    }

    #[test]
    fn area_only_ignores_extra_categories() {
        let p = Predictor::from_artifact(zeroed_artifact(Variant::AreaOnly)).unwrap();
        // Categories are parsed and echoed back but not encoded.
        let e = p.predict(10.0, Some("commercial"), Some("rural")).unwrap();
        assert_eq!(e.construction_type, Some(ConstructionType::Commercial));
        assert_eq!(e.cimento, 80.0);
    }

    #[test]
    fn mismatched_parameter_buffer_is_refused() {
        let mut artifact = zeroed_artifact(Variant::AreaOnly);
        artifact.params.pop();
        assert!(matches!(
            Predictor::from_artifact(artifact),
            Err(EstimatorError::WidthMismatch { .. })
        ));
    }
}
