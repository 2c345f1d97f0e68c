use ndarray::{Array1, Array2};

use crate::error::InputError;
use crate::sample::{ConstructionType, Region, Sample, Variant};
use crate::Result;

/// Rejects non-finite or non-positive areas before they reach the model.
pub fn validate_area(area: f32) -> Result<()> {
    if !area.is_finite() {
        return Err(InputError::NonFiniteArea.into());
    }
    if area <= 0.0 {
        return Err(InputError::NonPositiveArea { got: area }.into());
    }
    Ok(())
}

/// Encodes one raw input as the model's fixed-order feature vector.
///
/// Categorical variant: `[area] ++ one_hot(type) ++ one_hot(region)`. The
/// one-hot positions come from the enums' declared ordering; training and
/// inference share this function, so the ordering cannot drift between them.
pub fn encode(
    variant: Variant,
    area: f32,
    construction_type: Option<ConstructionType>,
    region: Option<Region>,
) -> Result<Array1<f32>> {
    validate_area(area)?;

    match variant {
        Variant::AreaOnly => Ok(Array1::from_vec(vec![area])),
        Variant::Categorical => {
            let t = construction_type.ok_or(InputError::MissingConstructionType)?;
            let r = region.ok_or(InputError::MissingRegion)?;

            let mut v = Array1::zeros(variant.feature_len());
            v[0] = area;
            v[1 + t.index()] = 1.0;
            v[4 + r.index()] = 1.0;
            Ok(v)
        }
    }
}

/// Stacks the feature vectors of `samples` into a `(n, F)` matrix.
pub fn feature_matrix(variant: Variant, samples: &[Sample]) -> Result<Array2<f32>> {
    let mut x = Array2::zeros((samples.len(), variant.feature_len()));
    for (i, s) in samples.iter().enumerate() {
        let row = encode(variant, s.area, Some(s.construction_type), Some(s.region))?;
        x.row_mut(i).assign(&row);
    }
    Ok(x)
}

/// Stacks the three label quantities into a `(n, 3)` matrix, ordered
/// cement, sand, bricks.
pub fn label_matrix(samples: &[Sample]) -> Array2<f32> {
    let mut y = Array2::zeros((samples.len(), 3));
    for (i, s) in samples.iter().enumerate() {
        y[[i, 0]] = s.cement;
        y[[i, 1]] = s.sand;
        y[[i, 2]] = s.bricks;
    }
    y
}
