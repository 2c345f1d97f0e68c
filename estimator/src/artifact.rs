use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors, serialize};
use serde::{Deserialize, Serialize};

use crate::sample::Variant;
use crate::scaling::MinMaxScaler;
use crate::{EstimatorError, Result};

pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const SCALERS_FILE: &str = "scalers.json";

const PARAMS_TENSOR: &str = "params";
const VERSION_KEY: &str = "version";

/// Everything inference needs, bundled so the pieces cannot drift apart.
///
/// On disk the bundle is two files in one directory: `model.safetensors`
/// (flat parameter tensor plus batch-norm running statistics, version tag in
/// the header metadata) and `scalers.json` (fitted normalization pairs plus
/// the same version tag). Loading verifies that both carry the same version;
/// a mismatch means the files come from different training runs and the
/// bundle is refused.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub version: String,
    pub variant: Variant,
    pub ratio_target: f32,
    pub params: Vec<f32>,
    pub state: Vec<(String, Vec<f32>)>,
    pub scaler_x: MinMaxScaler,
    pub scaler_y: MinMaxScaler,
}

/// Serialized shape of `scalers.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ScalerFile {
    version: String,
    variant: Variant,
    ratio_target: f32,
    scaler_x: MinMaxScaler,
    scaler_y: MinMaxScaler,
}

impl ModelArtifact {
    /// Writes the bundle into `dir`, creating it if needed.
    ///
    /// Each file is written to a temporary sibling first and renamed into
    /// place, so a crash mid-write never leaves a truncated artifact behind.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut buffers: Vec<(String, Vec<u8>)> = Vec::with_capacity(1 + self.state.len());
        buffers.push((PARAMS_TENSOR.to_string(), encode_f32(&self.params)));
        for (name, values) in &self.state {
            buffers.push((name.clone(), encode_f32(values)));
        }

        let views: Vec<(&str, TensorView<'_>)> = buffers
            .iter()
            .map(|(name, bytes)| {
                let view = TensorView::new(Dtype::F32, vec![bytes.len() / 4], bytes)
                    .map_err(|e| corrupt(dir.join(WEIGHTS_FILE), e.to_string()))?;
                Ok((name.as_str(), view))
            })
            .collect::<Result<_>>()?;

        let metadata = HashMap::from([(VERSION_KEY.to_string(), self.version.clone())]);
        let bytes = serialize(views, &Some(metadata))
            .map_err(|e| corrupt(dir.join(WEIGHTS_FILE), e.to_string()))?;
        write_atomic(&dir.join(WEIGHTS_FILE), &bytes)?;

        let scalers = ScalerFile {
            version: self.version.clone(),
            variant: self.variant,
            ratio_target: self.ratio_target,
            scaler_x: self.scaler_x.clone(),
            scaler_y: self.scaler_y.clone(),
        };
        let json = serde_json::to_vec_pretty(&scalers)
            .map_err(|e| corrupt(dir.join(SCALERS_FILE), e.to_string()))?;
        write_atomic(&dir.join(SCALERS_FILE), &json)?;

        Ok(())
    }

    /// Reads and cross-checks the bundle stored in `dir`.
    ///
    /// # Errors
    /// `ArtifactMissing` when either file is absent, `ArtifactMismatch` when
    /// their version tags disagree, `ArtifactCorrupt` when either file fails
    /// to parse.
    pub fn load(dir: &Path) -> Result<Self> {
        let weights_path = dir.join(WEIGHTS_FILE);
        let scalers_path = dir.join(SCALERS_FILE);

        let weight_bytes = read_required(&weights_path)?;
        let scaler_bytes = read_required(&scalers_path)?;

        let scalers: ScalerFile = serde_json::from_slice(&scaler_bytes).map_err(|e| {
            EstimatorError::Parse {
                path: scalers_path.clone(),
                line: e.line(),
                msg: e.to_string(),
            }
        })?;

        let (_, header) = SafeTensors::read_metadata(&weight_bytes)
            .map_err(|e| corrupt(weights_path.clone(), e.to_string()))?;
        let weights_version = header
            .metadata()
            .as_ref()
            .and_then(|m| m.get(VERSION_KEY))
            .cloned()
            .ok_or_else(|| corrupt(weights_path.clone(), "missing version metadata".to_string()))?;

        if weights_version != scalers.version {
            return Err(EstimatorError::ArtifactMismatch {
                weights_version,
                scalers_version: scalers.version,
            });
        }

        let tensors = SafeTensors::deserialize(&weight_bytes)
            .map_err(|e| corrupt(weights_path.clone(), e.to_string()))?;

        let params_view = tensors
            .tensor(PARAMS_TENSOR)
            .map_err(|e| corrupt(weights_path.clone(), e.to_string()))?;
        let params = decode_f32(&weights_path, &params_view)?;

        let mut state = Vec::new();
        for (name, view) in tensors.tensors() {
            if name == PARAMS_TENSOR {
                continue;
            }
            state.push((name.clone(), decode_f32(&weights_path, &view)?));
        }
        // Deserialization order is not guaranteed; keep the state listing
        // deterministic for callers that compare bundles.
        state.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            version: weights_version,
            variant: scalers.variant,
            ratio_target: scalers.ratio_target,
            params,
            state,
            scaler_x: scalers.scaler_x,
            scaler_y: scalers.scaler_y,
        })
    }
}

fn corrupt(path: PathBuf, msg: String) -> EstimatorError {
    EstimatorError::ArtifactCorrupt { path, msg }
}

fn read_required(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EstimatorError::ArtifactMissing { path: path.to_path_buf() },
        _ => EstimatorError::Io(e),
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn encode_f32(values: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

fn decode_f32(path: &Path, view: &TensorView<'_>) -> Result<Vec<f32>> {
    if view.dtype() != Dtype::F32 {
        return Err(corrupt(path.to_path_buf(), format!("expected F32 tensor, got {:?}", view.dtype())));
    }

    // Byte-wise decode: the data section of the file carries no alignment
    // guarantee, so a typed cast of the borrowed slice is not sound here.
    Ok(view
        .data()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
