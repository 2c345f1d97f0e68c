pub mod artifact;
pub mod config;
pub mod csv;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod loss;
pub mod model;
pub mod predict;
pub mod sample;
pub mod scaling;
pub mod synth;
pub mod trainer;

pub use error::{EstimatorError, InputError, Result};
pub use predict::Predictor;
pub use sample::{ConstructionType, Estimate, Region, Sample, Variant};
