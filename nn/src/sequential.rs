use std::ops::Range;

use ndarray::Array2;
use rand::Rng;

use crate::layers::Layer;
use crate::{NnError, Result};

/// A sequential model over a flat parameter buffer: information flows forward
/// when computing an output and backward when computing layer deltas.
///
/// The model owns no parameters. Callers hold the flat `Vec<f32>` (and a
/// matching gradient buffer) and pass slices in; each layer views its span.
/// The only mutable model state is per-layer forward caches and batch-norm
/// running statistics.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
    spans: Vec<Range<usize>>,
    num_params: usize,
}

impl Sequential {
    /// Creates a new `Sequential`, computing each layer's span in the flat
    /// parameter buffer.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        let mut spans = Vec::with_capacity(layers.len());
        let mut offset = 0;

        for layer in &layers {
            let len = layer.param_len();
            spans.push(offset..offset + len);
            offset += len;
        }

        Self { layers, spans, num_params: offset }
    }

    /// Returns the total number of scalar parameters the model expects.
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Allocates and initializes a fresh flat parameter buffer.
    pub fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = vec![0.0; self.num_params];
        for (layer, span) in self.layers.iter().zip(&self.spans) {
            layer.init_params(&mut params[span.clone()], rng)?;
        }
        Ok(params)
    }

    fn check_params(&self, params: &[f32]) -> Result<()> {
        if params.len() != self.num_params {
            return Err(NnError::ParamLengthMismatch {
                got: params.len(),
                expected: self.num_params,
            });
        }
        Ok(())
    }

    /// Training-time forward pass over all layers.
    pub fn forward(&mut self, params: &[f32], mut x: Array2<f32>) -> Result<Array2<f32>> {
        self.check_params(params)?;
        for (layer, span) in self.layers.iter_mut().zip(&self.spans) {
            x = layer.forward(&params[span.clone()], x)?;
        }
        Ok(x)
    }

    /// Evaluation-mode forward pass. Pure given fixed parameters, so a loaded
    /// model can serve concurrent callers behind a shared reference.
    pub fn infer(&self, params: &[f32], mut x: Array2<f32>) -> Result<Array2<f32>> {
        self.check_params(params)?;
        for (layer, span) in self.layers.iter().zip(&self.spans) {
            x = layer.infer(&params[span.clone()], x)?;
        }
        Ok(x)
    }

    /// Backpropagates `d` (dL/dy of the last forward batch), accumulating into
    /// `grads`. Callers zero `grads` between optimizer steps.
    pub fn backward(&mut self, params: &[f32], grads: &mut [f32], mut d: Array2<f32>) -> Result<()> {
        self.check_params(params)?;
        if grads.len() != self.num_params {
            return Err(NnError::ParamLengthMismatch {
                got: grads.len(),
                expected: self.num_params,
            });
        }

        for (layer, span) in self.layers.iter_mut().zip(&self.spans).rev() {
            d = layer.backward(&params[span.clone()], &mut grads[span.clone()], d)?;
        }
        Ok(())
    }

    /// Exports non-parameter layer state (batch-norm running statistics),
    /// keyed by layer position.
    pub fn state(&self) -> Vec<(String, Vec<f32>)> {
        let mut out = Vec::new();
        for (i, layer) in self.layers.iter().enumerate() {
            if let Layer::BatchNorm(bn) = layer {
                let (mean, var) = bn.state();
                out.push((format!("layer{i}.running_mean"), mean));
                out.push((format!("layer{i}.running_var"), var));
            }
        }
        out
    }

    /// Restores state previously exported by `state`.
    ///
    /// # Errors
    /// Returns `NnError::UnknownStateTensor` for names that do not address a
    /// batch-norm layer of this model.
    pub fn load_state(&mut self, entries: &[(String, Vec<f32>)]) -> Result<()> {
        for (name, values) in entries {
            let (index, field) = parse_state_name(name)?;
            let Some(Layer::BatchNorm(bn)) = self.layers.get_mut(index) else {
                return Err(NnError::UnknownStateTensor { name: name.clone() });
            };

            let (mut mean, mut var) = bn.state();
            match field {
                StateField::Mean => mean = values.clone(),
                StateField::Var => var = values.clone(),
            }
            bn.load_state(&mean, &var)?;
        }
        Ok(())
    }
}

enum StateField {
    Mean,
    Var,
}

fn parse_state_name(name: &str) -> Result<(usize, StateField)> {
    let unknown = || NnError::UnknownStateTensor { name: name.to_string() };

    let rest = name.strip_prefix("layer").ok_or_else(unknown)?;
    let (index, field) = rest.split_once('.').ok_or_else(unknown)?;
    let index: usize = index.parse().map_err(|_| unknown())?;

    let field = match field {
        "running_mean" => StateField::Mean,
        "running_var" => StateField::Var,
        _ => return Err(unknown()),
    };

    Ok((index, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::WeightInit;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tiny_model() -> Sequential {
        Sequential::new([
            Layer::dense((2, 4), WeightInit::KaimingNormal),
            Layer::relu(),
            Layer::dense((4, 1), WeightInit::KaimingNormal),
        ])
    }

    #[test]
    fn spans_cover_the_flat_buffer() {
        let model = tiny_model();
        assert_eq!(model.num_params(), 2 * 4 + 4 + 4 * 1 + 1);
    }

    #[test]
    fn infer_is_deterministic_given_fixed_params() {
        let model = tiny_model();
        let mut rng = StdRng::seed_from_u64(11);
        let params = model.init_params(&mut rng).unwrap();

        let x = array![[0.2, -1.3]];
        let a = model.infer(&params, x.clone()).unwrap();
        let b = model.infer(&params, x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn backward_rejects_mismatched_grad_buffer() {
        let mut model = tiny_model();
        let mut rng = StdRng::seed_from_u64(11);
        let params = model.init_params(&mut rng).unwrap();

        let y = model.forward(&params, array![[1.0, 2.0]]).unwrap();
        let mut grads = vec![0.0; 3];
        let res = model.backward(&params, &mut grads, Array2::from_elem(y.raw_dim(), 1.0));
        assert!(matches!(res, Err(NnError::ParamLengthMismatch { .. })));
    }

    #[test]
    fn state_round_trips_through_load() {
        let mut model = Sequential::new([
            Layer::dense((2, 3), WeightInit::XavierUniform),
            Layer::batch_norm(3),
            Layer::relu(),
        ]);
        let mut rng = StdRng::seed_from_u64(5);
        let params = model.init_params(&mut rng).unwrap();

        // Push a couple of batches through so the running stats move.
        for _ in 0..3 {
            model.forward(&params, array![[1.0, -2.0], [0.5, 4.0]]).unwrap();
        }

        let exported = model.state();
        assert_eq!(exported.len(), 2);

        let mut restored = Sequential::new([
            Layer::dense((2, 3), WeightInit::XavierUniform),
            Layer::batch_norm(3),
            Layer::relu(),
        ]);
        restored.load_state(&exported).unwrap();
        assert_eq!(restored.state(), exported);
    }

    #[test]
    fn load_state_rejects_foreign_names() {
        let mut model = tiny_model();
        let res = model.load_state(&[("layer0.running_mean".into(), vec![0.0; 4])]);
        assert!(matches!(res, Err(NnError::UnknownStateTensor { .. })));
    }
}
