use std::{error::Error, fmt};

/// The network core's result type.
pub type Result<T> = std::result::Result<T, NnError>;

/// Failures produced by layers, models and optimizers.
#[derive(Debug)]
pub enum NnError {
    /// The flat parameter buffer does not match the model's layout.
    ParamLengthMismatch {
        got: usize,
        expected: usize,
    },

    /// A tensor dimension invariant was violated.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// A layer was built with an invalid hyperparameter.
    InvalidLayer {
        what: &'static str,
        msg: &'static str,
    },

    /// A sampling distribution could not be constructed.
    BadDistribution {
        what: &'static str,
    },

    /// A forward or backward pass received an empty batch.
    EmptyBatch,

    /// A persisted state tensor does not belong to this model.
    UnknownStateTensor {
        name: String,
    },
}

impl fmt::Display for NnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnError::ParamLengthMismatch { got, expected } => {
                write!(f, "parameter buffer length mismatch: got {got}, expected {expected}")
            }
            NnError::ShapeMismatch { what, got, expected } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            NnError::InvalidLayer { what, msg } => {
                write!(f, "invalid {what} layer: {msg}")
            }
            NnError::BadDistribution { what } => {
                write!(f, "could not construct {what} distribution")
            }
            NnError::EmptyBatch => write!(f, "batch contains no rows"),
            NnError::UnknownStateTensor { name } => {
                write!(f, "state tensor {name:?} does not match any layer")
            }
        }
    }
}

impl Error for NnError {}
