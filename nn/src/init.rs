use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::{NnError, Result};

/// Variance-scaling weight initialization schemes.
///
/// The scheme should match the nonlinearity that consumes the layer's output:
/// fan-in scaled normal for rectified-linear units, fan-in/fan-out balanced
/// uniform for logistic outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightInit {
    /// Normal with standard deviation `sqrt(2 / fan_in)`.
    KaimingNormal,
    /// Uniform over `[-r, r]` with `r = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
}

impl WeightInit {
    /// Fills `out` with freshly sampled weights.
    ///
    /// # Args
    /// * `fan_in` - Number of input units of the weight tensor.
    /// * `fan_out` - Number of output units of the weight tensor.
    /// * `out` - Destination slice, filled completely.
    /// * `rng` - A random number generator.
    ///
    /// # Errors
    /// Returns `NnError::BadDistribution` if the derived distribution
    /// parameters are invalid (zero fan-in).
    pub fn fill<R: Rng>(self, fan_in: usize, fan_out: usize, out: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            WeightInit::KaimingNormal => {
                let std_dev = (2.0 / fan_in as f32).sqrt();
                let dist = Normal::new(0.0, std_dev)
                    .map_err(|_| NnError::BadDistribution { what: "kaiming normal" })?;
                for w in out.iter_mut() {
                    *w = dist.sample(rng);
                }
            }
            WeightInit::XavierUniform => {
                let range = (6.0 / (fan_in + fan_out) as f32).sqrt();
                let dist = Uniform::new_inclusive(-range, range)
                    .map_err(|_| NnError::BadDistribution { what: "xavier uniform" })?;
                for w in out.iter_mut() {
                    *w = dist.sample(rng);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn xavier_stays_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buf = [0.0_f32; 256];
        WeightInit::XavierUniform.fill(16, 16, &mut buf, &mut rng).unwrap();

        let range = (6.0_f32 / 32.0).sqrt();
        assert!(buf.iter().all(|w| w.abs() <= range));
        assert!(buf.iter().any(|w| *w != 0.0));
    }

    #[test]
    fn kaiming_has_fan_in_scaled_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buf = vec![0.0_f32; 10_000];
        WeightInit::KaimingNormal.fill(50, 10, &mut buf, &mut rng).unwrap();

        let mean = buf.iter().sum::<f32>() / buf.len() as f32;
        let var = buf.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / buf.len() as f32;
        let expected = 2.0 / 50.0;
        assert!((var - expected).abs() < expected * 0.2, "var {var} vs {expected}");
    }
}
