use ndarray::Array2;

use crate::Result;
use crate::activation::ActFn;

/// Rectified-linear activation layer. Caches the pre-activation batch so the
/// backward pass can mask the incoming delta.
#[derive(Debug, Clone, Default)]
pub struct Relu {
    z: Array2<f32>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, z: Array2<f32>) -> Result<Array2<f32>> {
        let a = z.mapv(|z| ActFn::Relu.f(z));
        self.z = z;
        Ok(a)
    }

    pub fn infer(&self, z: Array2<f32>) -> Result<Array2<f32>> {
        Ok(z.mapv_into(|z| ActFn::Relu.f(z)))
    }

    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        d.zip_mut_with(&self.z, |d, &z| *d *= ActFn::Relu.df(z));
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn backward_masks_negative_preactivations() {
        let mut relu = Relu::new();
        let a = relu.forward(array![[-1.0, 2.0]]).unwrap();
        assert_eq!(a, array![[0.0, 2.0]]);

        let d = relu.backward(array![[5.0, 5.0]]).unwrap();
        assert_eq!(d, array![[0.0, 5.0]]);
    }
}
