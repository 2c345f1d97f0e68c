use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EstimatorError, Result};

/// Every recognized training option with its default, validated at load
/// time. Defaults follow the production training script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub learning_rate: f32,
    pub max_epochs: usize,
    /// Consecutive non-improving epochs tolerated before stopping.
    pub patience: usize,
    pub val_split: f32,
    pub weight_decay: f32,
    /// Per-value gradient clip bound.
    pub grad_clip: f32,

    /// Per-output weights of the regression term, ordered cement, sand,
    /// bricks. Sand is upweighted: it is the output most prone to collapse.
    pub output_weights: [f32; 3],
    /// Huber transition point, in normalized label units.
    pub huber_delta: f32,

    /// Target sand/cement output ratio (concrete mix domain knowledge).
    pub ratio_target: f32,
    pub ratio_weight: f32,
    /// Normalized floor below which the scale penalty activates.
    pub scale_floor: f32,
    pub scale_weight: f32,
    /// Normalized floor specific to the sand output.
    pub min_sand: f32,
    pub min_sand_weight: f32,

    /// Epochs of validation stall before the learning rate is scaled.
    pub lr_plateau_patience: usize,
    pub lr_factor: f32,
    pub min_learning_rate: f32,

    /// Dropout probability of the categorical model's hidden layers.
    pub dropout: f32,

    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            learning_rate: 3e-3,
            max_epochs: 200,
            patience: 10,
            val_split: 0.2,
            weight_decay: 1e-5,
            grad_clip: 1.0,

            output_weights: [1.0, 2.0, 1.0],
            huber_delta: 1.0,

            ratio_target: 3.0,
            ratio_weight: 0.1,
            scale_floor: 0.05,
            scale_weight: 0.1,
            min_sand: 0.1,
            min_sand_weight: 0.1,

            lr_plateau_patience: 5,
            lr_factor: 0.5,
            min_learning_rate: 1e-5,

            dropout: 0.2,

            seed: 42,
        }
    }
}

impl TrainConfig {
    /// Loads and validates a config from a JSON file. Absent fields keep
    /// their defaults; unknown fields are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EstimatorError::ArtifactMissing { path: path.to_path_buf() },
            _ => EstimatorError::Io(e),
        })?;

        let cfg: Self = serde_json::from_str(&raw).map_err(|e| EstimatorError::Parse {
            path: path.to_path_buf(),
            line: e.line(),
            msg: e.to_string(),
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every field's domain.
    pub fn validate(&self) -> Result<()> {
        let bad = |field: &'static str, msg: &'static str| {
            Err(EstimatorError::InvalidConfig { field, msg })
        };

        if self.batch_size == 0 {
            return bad("batch_size", "must be greater than zero");
        }
        if !(self.learning_rate > 0.0) {
            return bad("learning_rate", "must be positive");
        }
        if self.max_epochs == 0 {
            return bad("max_epochs", "must be greater than zero");
        }
        if self.patience == 0 {
            return bad("patience", "must be greater than zero");
        }
        if !(self.val_split > 0.0 && self.val_split < 1.0) {
            return bad("val_split", "must lie strictly between 0 and 1");
        }
        if self.weight_decay < 0.0 {
            return bad("weight_decay", "must be non-negative");
        }
        if !(self.grad_clip > 0.0) {
            return bad("grad_clip", "must be positive");
        }
        if self.output_weights.iter().any(|w| *w <= 0.0) {
            return bad("output_weights", "every weight must be positive");
        }
        if !(self.huber_delta > 0.0) {
            return bad("huber_delta", "must be positive");
        }
        if !(self.ratio_target > 0.0) {
            return bad("ratio_target", "must be positive");
        }
        if self.ratio_weight < 0.0 || self.scale_weight < 0.0 || self.min_sand_weight < 0.0 {
            return bad("penalty weights", "must be non-negative");
        }
        if self.lr_plateau_patience == 0 {
            return bad("lr_plateau_patience", "must be greater than zero");
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return bad("lr_factor", "must lie strictly between 0 and 1");
        }
        if !(self.min_learning_rate > 0.0) {
            return bad("min_learning_rate", "must be positive");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return bad("dropout", "must be in [0, 1)");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_batch_size() {
        let cfg = TrainConfig { batch_size: 0, ..Default::default() };
        assert!(matches!(
            cfg.validate(),
            Err(EstimatorError::InvalidConfig { field: "batch_size", .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_val_split() {
        let cfg = TrainConfig { val_split: 1.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: TrainConfig = serde_json::from_str(r#"{"batch_size": 64}"#).unwrap();
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.max_epochs, TrainConfig::default().max_epochs);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: std::result::Result<TrainConfig, _> =
            serde_json::from_str(r#"{"batch_sise": 64}"#);
        assert!(res.is_err());
    }
}
