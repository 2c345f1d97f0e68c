use ndarray::Array2;

use crate::Result;
use crate::activation::ActFn;

/// Logistic activation layer. Caches its own output, whose closed-form
/// derivative `a * (1 - a)` drives the backward pass.
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    a: Array2<f32>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, z: Array2<f32>) -> Result<Array2<f32>> {
        let a = z.mapv_into(|z| ActFn::Sigmoid.f(z));
        self.a = a.clone();
        Ok(a)
    }

    pub fn infer(&self, z: Array2<f32>) -> Result<Array2<f32>> {
        Ok(z.mapv_into(|z| ActFn::Sigmoid.f(z)))
    }

    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        d.zip_mut_with(&self.a, |d, &a| *d *= a * (1.0 - a));
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn output_bounded_to_unit_interval() {
        let mut sig = Sigmoid::new();
        let a = sig.forward(array![[-30.0, 0.0, 30.0]]).unwrap();
        assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((a[[0, 1]] - 0.5).abs() < 1e-6);
    }
}
