use nn::Sequential;
use nn::init::WeightInit;
use nn::layers::Layer;

use crate::Result;
use crate::sample::Variant;

const HIDDEN_1: usize = 64;
const HIDDEN_2: usize = 32;
const OUTPUTS: usize = 3;

/// Builds the regression network for a variant.
///
/// Both variants share the F -> 64 -> 32 -> 3 trunk. The area-only model is a
/// plain ReLU stack, ReLU included at the output so raw quantities stay
/// non-negative. The categorical model adds batch normalization and dropout
/// after each hidden layer and ends in a sigmoid, matching its labels living
/// in `[0, 1]` after min-max scaling. Hidden layers use Kaiming init for the
/// ReLU that follows them; the sigmoid head uses Xavier.
pub fn build(variant: Variant, dropout: f32, seed: u64) -> Result<Sequential> {
    let f = variant.feature_len();

    let model = match variant {
        Variant::AreaOnly => Sequential::new([
            Layer::dense((f, HIDDEN_1), WeightInit::KaimingNormal),
            Layer::relu(),
            Layer::dense((HIDDEN_1, HIDDEN_2), WeightInit::KaimingNormal),
            Layer::relu(),
            Layer::dense((HIDDEN_2, OUTPUTS), WeightInit::KaimingNormal),
            Layer::relu(),
        ]),
        Variant::Categorical => Sequential::new([
            Layer::dense((f, HIDDEN_1), WeightInit::KaimingNormal),
            Layer::batch_norm(HIDDEN_1),
            Layer::relu(),
            Layer::dropout(dropout, seed)?,
            Layer::dense((HIDDEN_1, HIDDEN_2), WeightInit::KaimingNormal),
            Layer::batch_norm(HIDDEN_2),
            Layer::relu(),
            Layer::dropout(dropout, seed.wrapping_add(1))?,
            Layer::dense((HIDDEN_2, OUTPUTS), WeightInit::XavierUniform),
            Layer::sigmoid(),
        ]),
    };

    Ok(model)
}
