use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nn::Sequential;
use nn::loss::LossFn;
use nn::optimizer::{Adam, Optimizer, clip_values};

use crate::artifact::ModelArtifact;
use crate::config::TrainConfig;
use crate::dataset::TensorDataset;
use crate::encode::{feature_matrix, label_matrix};
use crate::loss::{CompositeLoss, RATIO_EPS};
use crate::model;
use crate::sample::{Sample, Variant};
use crate::scaling::MinMaxScaler;
use crate::{EstimatorError, Result};

/// Why a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Validation loss stalled for `patience` consecutive epochs.
    Converged,
    MaxEpochsReached,
    /// The caller raised the stop flag; checked at epoch boundaries only.
    Cancelled,
}

/// Per-epoch diagnostics, also the row format of the metrics log.
#[derive(Debug, Clone)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub learning_rate: f32,
    /// Mean sand over mean cement of the validation predictions, in
    /// normalized units. Collapse shows up here before it shows up in the
    /// loss.
    pub sand_cement_ratio: f32,
    pub mean_outputs: [f32; 3],
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub stop_reason: StopReason,
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f32,
    pub history: Vec<EpochStats>,
}

/// A trained bundle plus how training went.
#[derive(Debug)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub report: TrainReport,
}

/// Mutable run state, explicit rather than ambient. Checkpointing copies the
/// best parameters aside; the artifact is built from the copy, never from
/// whatever the final epoch left behind.
struct TrainingState {
    best_params: Vec<f32>,
    best_state: Vec<(String, Vec<f32>)>,
    best_val: f32,
    best_epoch: usize,
    stale_epochs: usize,
    plateau_epochs: usize,
}

impl TrainingState {
    fn new(params: &[f32], model: &Sequential) -> Self {
        Self {
            best_params: params.to_vec(),
            best_state: model.state(),
            best_val: f32::INFINITY,
            best_epoch: 0,
            stale_epochs: 0,
            plateau_epochs: 0,
        }
    }

    /// Records an epoch's validation loss. Only a strict improvement counts;
    /// ties age the patience counters.
    fn observe(&mut self, epoch: usize, val_loss: f32, params: &[f32], model: &Sequential) -> bool {
        if val_loss < self.best_val {
            self.best_val = val_loss;
            self.best_epoch = epoch;
            self.best_params.copy_from_slice(params);
            self.best_state = model.state();
            self.stale_epochs = 0;
            self.plateau_epochs = 0;
            true
        } else {
            self.stale_epochs += 1;
            self.plateau_epochs += 1;
            false
        }
    }
}

/// Trains one model variant end to end: normalization, mini-batch
/// optimization, validation-driven early stopping, checkpoint selection.
pub struct Trainer {
    variant: Variant,
    cfg: TrainConfig,
}

impl Trainer {
    /// # Errors
    /// Returns `InvalidConfig` when any config field is out of domain.
    pub fn new(variant: Variant, cfg: TrainConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { variant, cfg })
    }

    /// Runs a full training session over `samples`.
    ///
    /// The returned artifact holds the parameters of the best validation
    /// epoch, not the last one. `stop` is polled between epochs; raising it
    /// ends the run with `StopReason::Cancelled` and still returns the best
    /// checkpoint so far. When `metrics_log` is set, per-epoch stats are
    /// appended there as CSV.
    ///
    /// # Errors
    /// `DatasetTooSmall` when `samples` cannot support the validation split.
    pub fn train(
        &self,
        samples: &[Sample],
        stop: &AtomicBool,
        metrics_log: Option<&Path>,
    ) -> Result<TrainedModel> {
        let cfg = &self.cfg;
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let x = feature_matrix(self.variant, samples)?;
        let y = label_matrix(samples);
        let mut raw = TensorDataset::new(x, y)?;
        raw.shuffle(&mut rng);
        let (raw_train, raw_val) = raw.split(cfg.val_split)?;

        // Scalers see the training split only; the validation set stays out
        // of every fitted statistic.
        let scaler_x = MinMaxScaler::fit(raw_train.x())?;
        let scaler_y = MinMaxScaler::fit(raw_train.y())?;

        let mut train = TensorDataset::new(
            scaler_x.transform(raw_train.x())?,
            scaler_y.transform(raw_train.y())?,
        )?;
        let val = TensorDataset::new(
            scaler_x.transform(raw_val.x())?,
            scaler_y.transform(raw_val.y())?,
        )?;

        let mut model = model::build(self.variant, cfg.dropout, cfg.seed)?;
        let mut params = model.init_params(&mut rng)?;
        let mut grads = vec![0.0; model.num_params()];
        let mut adam = Adam::new(model.num_params(), cfg.learning_rate, cfg.weight_decay);
        let loss = CompositeLoss::from_config(cfg);

        let mut state = TrainingState::new(&params, &model);
        let mut writer = metrics_log.map(open_metrics_log).transpose()?;

        info!(
            "training {:?} model: {} train / {} val samples, {} parameters",
            self.variant,
            train.len(),
            val.len(),
            model.num_params()
        );

        let mut history = Vec::new();
        let mut stop_reason = StopReason::MaxEpochsReached;
        let mut epochs_run = 0;

        for epoch in 1..=cfg.max_epochs {
            if stop.load(Ordering::Relaxed) {
                info!("stop requested, ending after epoch {}", epoch - 1);
                stop_reason = StopReason::Cancelled;
                break;
            }
            epochs_run = epoch;

            train.shuffle(&mut rng);
            let mut train_loss = 0.0;
            for (xb, yb) in train.batches(cfg.batch_size) {
                let pred = model.forward(&params, xb.to_owned())?;
                train_loss += loss.loss(pred.view(), yb) * xb.nrows() as f32;

                grads.fill(0.0);
                let d = loss.loss_prime(pred.view(), yb);
                model.backward(&params, &mut grads, d)?;
                clip_values(&mut grads, cfg.grad_clip);
                adam.step(&mut params, &grads)?;
            }
            train_loss /= train.len() as f32;

            let val_pred = model.infer(&params, val.x().to_owned())?;
            let val_loss = loss.loss(val_pred.view(), val.y());

            let mut mean_outputs = [0.0f32; 3];
            for (j, col) in val_pred.columns().into_iter().enumerate() {
                mean_outputs[j] = col.sum() / col.len() as f32;
            }
            let sand_cement_ratio = mean_outputs[1] / (mean_outputs[0] + RATIO_EPS);

            let stats = EpochStats {
                epoch,
                train_loss,
                val_loss,
                learning_rate: adam.learning_rate(),
                sand_cement_ratio,
                mean_outputs,
            };
            if let Some(w) = writer.as_mut() {
                append_metrics(w, &stats)?;
            }

            if state.observe(epoch, val_loss, &params, &model) {
                debug!(
                    "epoch {epoch}: train={train_loss:.5} val={val_loss:.5} ratio={sand_cement_ratio:.2} (checkpoint)"
                );
            } else {
                debug!(
                    "epoch {epoch}: train={train_loss:.5} val={val_loss:.5} stale={}",
                    state.stale_epochs
                );
            }
            history.push(stats);

            if state.stale_epochs >= cfg.patience {
                info!(
                    "early stop at epoch {epoch}: no improvement for {} epochs, best val {:.5} at epoch {}",
                    state.stale_epochs, state.best_val, state.best_epoch
                );
                stop_reason = StopReason::Converged;
                break;
            }

            if state.plateau_epochs >= cfg.lr_plateau_patience {
                let lr = (adam.learning_rate() * cfg.lr_factor).max(cfg.min_learning_rate);
                if lr < adam.learning_rate() {
                    info!("validation plateau at epoch {epoch}, learning rate -> {lr:.2e}");
                    adam.set_learning_rate(lr);
                }
                state.plateau_epochs = 0;
            }
        }

        if let Some(w) = writer.as_mut() {
            w.flush()?;
        }

        // Never-improved runs (cancelled before the first epoch) keep the
        // initial parameters and an infinite best loss.
        let version = format!("{:016x}", rng.random::<u64>());
        info!(
            "training finished: {stop_reason:?} after {epochs_run} epochs, best val {:.5} at epoch {}, version {version}",
            state.best_val, state.best_epoch
        );

        let artifact = ModelArtifact {
            version,
            variant: self.variant,
            ratio_target: cfg.ratio_target,
            params: state.best_params,
            state: state.best_state,
            scaler_x,
            scaler_y,
        };

        Ok(TrainedModel {
            artifact,
            report: TrainReport {
                stop_reason,
                epochs_run,
                best_epoch: state.best_epoch,
                best_val_loss: state.best_val,
                history,
            },
        })
    }
}

fn open_metrics_log(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(EstimatorError::Io)?;
    let mut w = BufWriter::new(file);
    writeln!(
        w,
        "epoch,train_loss,val_loss,learning_rate,sand_cement_ratio,mean_cement,mean_sand,mean_bricks"
    )?;
    Ok(w)
}

fn append_metrics(w: &mut BufWriter<File>, s: &EpochStats) -> Result<()> {
    writeln!(
        w,
        "{},{},{},{},{},{},{},{}",
        s.epoch,
        s.train_loss,
        s.val_loss,
        s.learning_rate,
        s.sand_cement_ratio,
        s.mean_outputs[0],
        s.mean_outputs[1],
        s.mean_outputs[2]
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{SynthConfig, synthesize};

    fn quick_config() -> TrainConfig {
        TrainConfig {
            batch_size: 64,
            max_epochs: 15,
            patience: 4,
            ..Default::default()
        }
    }

    #[test]
    fn config_is_validated_at_construction() {
        let cfg = TrainConfig { learning_rate: -1.0, ..Default::default() };
        assert!(Trainer::new(Variant::AreaOnly, cfg).is_err());
    }

    #[test]
    fn training_produces_a_best_checkpoint_bundle() {
        let samples = synthesize(&SynthConfig::new(600, 3, Variant::AreaOnly)).unwrap();
        let trainer = Trainer::new(Variant::AreaOnly, quick_config()).unwrap();

        let trained = trainer.train(&samples, &AtomicBool::new(false), None).unwrap();
        assert!(trained.report.epochs_run >= 1);
        assert!(trained.report.best_val_loss.is_finite());
        assert_eq!(trained.artifact.variant, Variant::AreaOnly);
        assert_eq!(trained.artifact.version.len(), 16);
        assert_eq!(trained.artifact.scaler_x.width(), 1);
        assert_eq!(trained.artifact.scaler_y.width(), 3);
    }

    #[test]
    fn best_val_loss_matches_history_minimum() {
        let samples = synthesize(&SynthConfig::new(600, 5, Variant::AreaOnly)).unwrap();
        let trainer = Trainer::new(Variant::AreaOnly, quick_config()).unwrap();
        let trained = trainer.train(&samples, &AtomicBool::new(false), None).unwrap();

        let min = trained
            .report
            .history
            .iter()
            .map(|s| s.val_loss)
            .fold(f32::INFINITY, f32::min);
        assert_eq!(trained.report.best_val_loss, min);
    }

    #[test]
    fn stop_flag_cancels_before_the_first_epoch() {
        let samples = synthesize(&SynthConfig::new(300, 3, Variant::AreaOnly)).unwrap();
        let trainer = Trainer::new(Variant::AreaOnly, quick_config()).unwrap();

        let stop = AtomicBool::new(true);
        let trained = trainer.train(&samples, &stop, None).unwrap();
        assert_eq!(trained.report.stop_reason, StopReason::Cancelled);
        assert_eq!(trained.report.epochs_run, 0);
        assert!(trained.report.history.is_empty());
    }

    #[test]
    fn tiny_dataset_is_rejected() {
        let samples = synthesize(&SynthConfig::new(2, 3, Variant::AreaOnly)).unwrap();
        let trainer = Trainer::new(Variant::AreaOnly, quick_config()).unwrap();
        let res = trainer.train(&samples, &AtomicBool::new(false), None);
        assert!(matches!(res, Err(EstimatorError::DatasetTooSmall { .. })));
    }

    #[test]
    fn metrics_log_gets_one_row_per_epoch() {
        let samples = synthesize(&SynthConfig::new(300, 9, Variant::AreaOnly)).unwrap();
        let cfg = TrainConfig { max_epochs: 3, patience: 10, ..quick_config() };
        let trainer = Trainer::new(Variant::AreaOnly, cfg).unwrap();

        let path = std::env::temp_dir().join(format!("estimator-metrics-{}.csv", std::process::id()));
        let trained = trainer.train(&samples, &AtomicBool::new(false), Some(&path)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(lines[0].starts_with("epoch,train_loss"));
        assert_eq!(lines.len(), 1 + trained.report.epochs_run);

        std::fs::remove_file(&path).unwrap();
    }
}
