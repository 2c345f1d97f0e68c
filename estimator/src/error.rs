use std::{error::Error, fmt, io, path::PathBuf};

use nn::NnError;

/// The engine's result type.
pub type Result<T> = std::result::Result<T, EstimatorError>;

/// A caller-supplied value rejected before touching the model.
///
/// These are surfaced synchronously, never retried, and map to a 4xx-class
/// response at the HTTP boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    NonPositiveArea { got: f32 },
    NonFiniteArea,
    UnknownConstructionType { got: String },
    UnknownRegion { got: String },
    MissingConstructionType,
    MissingRegion,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::NonPositiveArea { got } => {
                write!(f, "area must be strictly positive, got {got}")
            }
            InputError::NonFiniteArea => write!(f, "area must be a finite number"),
            InputError::UnknownConstructionType { got } => {
                write!(f, "unknown construction type {got:?}")
            }
            InputError::UnknownRegion { got } => write!(f, "unknown region {got:?}"),
            InputError::MissingConstructionType => {
                write!(f, "construction type is required for this model variant")
            }
            InputError::MissingRegion => write!(f, "region is required for this model variant"),
        }
    }
}

impl Error for InputError {}

/// Engine failures.
#[derive(Debug)]
pub enum EstimatorError {
    /// Invalid caller input; see `InputError`.
    InvalidInput(InputError),

    /// A checkpoint or scaler file is absent at inference load time.
    ArtifactMissing { path: PathBuf },

    /// Checkpoint and scaler files carry different version tags; they were
    /// not produced by the same training run.
    ArtifactMismatch {
        weights_version: String,
        scalers_version: String,
    },

    /// A persisted artifact exists but its contents are unusable.
    ArtifactCorrupt { path: PathBuf, msg: String },

    /// A configuration field failed validation.
    InvalidConfig {
        field: &'static str,
        msg: &'static str,
    },

    /// The training set is empty or too small for the requested split.
    DatasetTooSmall { got: usize, needed: usize },

    /// A dataset file row could not be parsed.
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    /// Feature or label width disagrees with the fitted parameters.
    WidthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    Io(io::Error),
    Nn(NnError),
}

impl EstimatorError {
    /// True when the failure should map to a 400-class response.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, EstimatorError::InvalidInput(_))
    }
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorError::InvalidInput(e) => write!(f, "invalid input: {e}"),
            EstimatorError::ArtifactMissing { path } => {
                write!(f, "artifact file {} is missing", path.display())
            }
            EstimatorError::ArtifactMismatch { weights_version, scalers_version } => write!(
                f,
                "artifact version mismatch: weights tagged {weights_version:?}, scalers tagged {scalers_version:?}"
            ),
            EstimatorError::ArtifactCorrupt { path, msg } => {
                write!(f, "artifact file {} is corrupt: {msg}", path.display())
            }
            EstimatorError::InvalidConfig { field, msg } => {
                write!(f, "invalid config field {field}: {msg}")
            }
            EstimatorError::DatasetTooSmall { got, needed } => {
                write!(f, "dataset has {got} samples, need at least {needed}")
            }
            EstimatorError::Parse { path, line, msg } => {
                write!(f, "parse error in {} at line {line}: {msg}", path.display())
            }
            EstimatorError::WidthMismatch { what, got, expected } => {
                write!(f, "width mismatch for {what}: got {got}, expected {expected}")
            }
            EstimatorError::Io(e) => write!(f, "io error: {e}"),
            EstimatorError::Nn(e) => write!(f, "model error: {e}"),
        }
    }
}

impl Error for EstimatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EstimatorError::InvalidInput(e) => Some(e),
            EstimatorError::Io(e) => Some(e),
            EstimatorError::Nn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InputError> for EstimatorError {
    fn from(e: InputError) -> Self {
        EstimatorError::InvalidInput(e)
    }
}

impl From<io::Error> for EstimatorError {
    fn from(e: io::Error) -> Self {
        EstimatorError::Io(e)
    }
}

impl From<NnError> for EstimatorError {
    fn from(e: NnError) -> Self {
        EstimatorError::Nn(e)
    }
}
