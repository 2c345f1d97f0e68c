use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::{env, fmt};

use log::info;

use estimator::config::TrainConfig;
use estimator::csv;
use estimator::synth::{SynthConfig, synthesize};
use estimator::trainer::Trainer;
use estimator::{Predictor, Variant};

const USAGE: &str = "\
usage: estimator <command> [options]

commands:
  generate   synthesize a labeled dataset
      --out <file.csv>          output path (required)
      --samples <n>             sample count [10000]
      --seed <n>                rng seed [42]
      --variant <v>             area-only | categorical [categorical]

  train      fit a model on a dataset
      --data <file.csv>         dataset path (required)
      --out <dir>               artifact directory (required)
      --variant <v>             area-only | categorical [categorical]
      --config <file.json>      training config overrides
      --metrics <file.csv>      per-epoch metrics log

  predict    estimate materials with a trained model
      --model <dir>             artifact directory (required)
      --area <m2>               built area (required)
      --type <t>                residential | commercial | industrial
      --region <r>              urban | suburban | rural
";

#[derive(Debug)]
enum CliError {
    Usage(String),
    Engine(estimator::EstimatorError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl From<estimator::EstimatorError> for CliError {
    fn from(e: estimator::EstimatorError) -> Self {
        CliError::Engine(e)
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}\n\n{USAGE}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return Err(CliError::Usage("missing command".to_string()));
    }

    let command = args.remove(0);
    match command.as_str() {
        "generate" => generate(&mut args),
        "train" => train(&mut args),
        "predict" => predict(&mut args),
        other => Err(CliError::Usage(format!("unknown command {other:?}"))),
    }
}

fn generate(args: &mut Vec<String>) -> Result<(), CliError> {
    let out = required_path(args, "--out")?;
    let samples = parse_or(args, "--samples", 10_000usize)?;
    let seed = parse_or(args, "--seed", 42u64)?;
    let variant = variant_or_default(args)?;
    reject_leftovers(args)?;

    let dataset = synthesize(&SynthConfig::new(samples, seed, variant))?;
    csv::write_dataset(&out, &dataset)?;
    info!("wrote {} samples to {}", dataset.len(), out.display());
    Ok(())
}

fn train(args: &mut Vec<String>) -> Result<(), CliError> {
    let data = required_path(args, "--data")?;
    let out = required_path(args, "--out")?;
    let variant = variant_or_default(args)?;
    let config = take_flag(args, "--config")?.map(PathBuf::from);
    let metrics = take_flag(args, "--metrics")?.map(PathBuf::from);
    reject_leftovers(args)?;

    let cfg = match config {
        Some(path) => TrainConfig::load(&path)?,
        None => TrainConfig::default(),
    };

    let samples = csv::read_dataset(&data)?;
    let trainer = Trainer::new(variant, cfg)?;
    let trained = trainer.train(&samples, &AtomicBool::new(false), metrics.as_deref())?;

    trained.artifact.save(&out)?;
    println!(
        "trained {variant} model {}: {:?} after {} epochs, best val loss {:.5} (epoch {})",
        trained.artifact.version,
        trained.report.stop_reason,
        trained.report.epochs_run,
        trained.report.best_val_loss,
        trained.report.best_epoch,
    );
    Ok(())
}

fn predict(args: &mut Vec<String>) -> Result<(), CliError> {
    let model = required_path(args, "--model")?;
    let area: f32 = parse_required(args, "--area")?;
    let construction_type = take_flag(args, "--type")?;
    let region = take_flag(args, "--region")?;
    reject_leftovers(args)?;

    let predictor = Predictor::load(&model)?;
    let estimate = predictor.predict(area, construction_type.as_deref(), region.as_deref())?;

    let json = serde_json::to_string_pretty(&estimate)
        .map_err(|e| CliError::Engine(std::io::Error::other(e).into()))?;
    println!("{json}");
    Ok(())
}

/// Removes `name <value>` from `args`, if present.
fn take_flag(args: &mut Vec<String>, name: &str) -> Result<Option<String>, CliError> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(CliError::Usage(format!("{name} needs a value")));
    }

    args.remove(pos);
    Ok(Some(args.remove(pos)))
}

fn required_path(args: &mut Vec<String>, name: &str) -> Result<PathBuf, CliError> {
    take_flag(args, name)?
        .map(PathBuf::from)
        .ok_or_else(|| CliError::Usage(format!("{name} is required")))
}

fn parse_required<T: std::str::FromStr>(args: &mut Vec<String>, name: &str) -> Result<T, CliError> {
    let raw = take_flag(args, name)?.ok_or_else(|| CliError::Usage(format!("{name} is required")))?;
    raw.parse()
        .map_err(|_| CliError::Usage(format!("{name}: could not parse {raw:?}")))
}

fn parse_or<T: std::str::FromStr>(args: &mut Vec<String>, name: &str, default: T) -> Result<T, CliError> {
    match take_flag(args, name)? {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CliError::Usage(format!("{name}: could not parse {raw:?}"))),
    }
}

fn variant_or_default(args: &mut Vec<String>) -> Result<Variant, CliError> {
    match take_flag(args, "--variant")?.as_deref() {
        None | Some("categorical") => Ok(Variant::Categorical),
        Some("area-only") => Ok(Variant::AreaOnly),
        Some(other) => Err(CliError::Usage(format!(
            "--variant: expected area-only or categorical, got {other:?}"
        ))),
    }
}

fn reject_leftovers(args: &[String]) -> Result<(), CliError> {
    if let Some(first) = args.first() {
        return Err(CliError::Usage(format!("unrecognized argument {first:?}")));
    }
    Ok(())
}
