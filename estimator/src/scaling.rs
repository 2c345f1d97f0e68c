use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{EstimatorError, Result};

/// Per-column min-max rescaling into `[0, 1]`.
///
/// Fit once on the training split and persisted; inference must load the
/// fitted pairs verbatim. Values outside the fitted range are not clipped in
/// either direction; only final physical outputs get clipped, elsewhere.
/// A degenerate column (`max == min`) transforms to `0` instead of dividing
/// by zero, and inverts back to its constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    mins: Vec<f32>,
    maxs: Vec<f32>,
}

impl MinMaxScaler {
    /// Fits the scaler over the columns of `data`.
    ///
    /// # Errors
    /// Returns `EstimatorError::DatasetTooSmall` when `data` has no rows.
    pub fn fit(data: ArrayView2<f32>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(EstimatorError::DatasetTooSmall { got: 0, needed: 1 });
        }

        let mut mins = vec![f32::INFINITY; data.ncols()];
        let mut maxs = vec![f32::NEG_INFINITY; data.ncols()];
        for row in data.rows() {
            for (j, &v) in row.iter().enumerate() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }

        Ok(Self { mins, maxs })
    }

    /// Number of columns this scaler was fit on.
    pub fn width(&self) -> usize {
        self.mins.len()
    }

    fn check_width(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.width() {
            return Err(EstimatorError::WidthMismatch {
                what,
                got,
                expected: self.width(),
            });
        }
        Ok(())
    }

    #[inline]
    fn scale(&self, j: usize, v: f32) -> f32 {
        let span = self.maxs[j] - self.mins[j];
        if span == 0.0 {
            0.0
        } else {
            (v - self.mins[j]) / span
        }
    }

    #[inline]
    fn unscale(&self, j: usize, v: f32) -> f32 {
        self.mins[j] + v * (self.maxs[j] - self.mins[j])
    }

    /// Rescales a batch into the fitted `[0, 1]` ranges.
    pub fn transform(&self, data: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_width("transform input", data.ncols())?;

        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.scale(j, *v);
            }
        }
        Ok(out)
    }

    /// Rescales a single feature vector.
    pub fn transform_row(&self, row: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_width("transform input", row.len())?;
        Ok(Array1::from_iter(row.iter().enumerate().map(|(j, &v)| self.scale(j, v))))
    }

    /// Maps normalized values back to physical units.
    pub fn inverse_row(&self, row: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_width("inverse input", row.len())?;
        Ok(Array1::from_iter(row.iter().enumerate().map(|(j, &v)| self.unscale(j, v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn endpoints_round_trip() {
        let data = array![[1.0, 10.0], [5.0, 50.0], [3.0, 30.0]];
        let scaler = MinMaxScaler::fit(data.view()).unwrap();

        for original in [array![1.0, 10.0], array![5.0, 50.0]] {
            let scaled = scaler.transform_row(original.view()).unwrap();
            let back = scaler.inverse_row(scaled.view()).unwrap();
            for (a, b) in back.iter().zip(original.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn fitted_range_maps_to_unit_interval() {
        let data = array![[2.0], [4.0], [6.0]];
        let scaler = MinMaxScaler::fit(data.view()).unwrap();
        let scaled = scaler.transform(data.view()).unwrap();
        assert_relative_eq!(scaled[[0, 0]], 0.0);
        assert_relative_eq!(scaled[[1, 0]], 0.5);
        assert_relative_eq!(scaled[[2, 0]], 1.0);
    }

    #[test]
    fn degenerate_column_scales_to_zero() {
        let data = array![[7.0, 1.0], [7.0, 2.0]];
        let scaler = MinMaxScaler::fit(data.view()).unwrap();

        let scaled = scaler.transform_row(array![7.0, 1.5].view()).unwrap();
        assert_eq!(scaled[0], 0.0);

        // The inverse of the degenerate column is its constant.
        let back = scaler.inverse_row(scaled.view()).unwrap();
        assert_relative_eq!(back[0], 7.0);
    }

    #[test]
    fn out_of_range_values_are_not_clipped() {
        let data = array![[0.0], [10.0]];
        let scaler = MinMaxScaler::fit(data.view()).unwrap();
        let scaled = scaler.transform_row(array![20.0].view()).unwrap();
        assert_relative_eq!(scaled[0], 2.0);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let scaler = MinMaxScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        let res = scaler.transform_row(array![1.0].view());
        assert!(matches!(res, Err(EstimatorError::WidthMismatch { .. })));
    }

    #[test]
    fn serde_round_trips() {
        let scaler = MinMaxScaler::fit(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        let json = serde_json::to_string(&scaler).unwrap();
        let back: MinMaxScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(scaler, back);
    }
}
