use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::{EstimatorError, Result};

/// Normalized feature/label tensors ready for the training loop.
#[derive(Debug, Clone)]
pub struct TensorDataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl TensorDataset {
    /// Creates a new dataset from matching tensors.
    ///
    /// # Errors
    /// Returns `WidthMismatch` when row counts disagree and
    /// `DatasetTooSmall` when empty.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(EstimatorError::WidthMismatch {
                what: "dataset rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }
        if x.nrows() == 0 {
            return Err(EstimatorError::DatasetTooSmall { got: 0, needed: 1 });
        }

        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Reorders samples with a fresh random permutation.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut idx: Vec<usize> = (0..self.len()).collect();
        idx.shuffle(rng);

        self.x = self.x.select(Axis(0), &idx);
        self.y = self.y.select(Axis(0), &idx);
    }

    /// Splits off the trailing `val_fraction` of rows as a validation set.
    /// Callers shuffle first; the split itself is deterministic.
    ///
    /// # Errors
    /// Returns `DatasetTooSmall` if either side would be empty.
    pub fn split(self, val_fraction: f32) -> Result<(Self, Self)> {
        let n = self.len();
        let n_val = ((n as f32) * val_fraction).round() as usize;
        if n_val == 0 || n_val >= n {
            return Err(EstimatorError::DatasetTooSmall {
                got: n,
                needed: (1.0 / val_fraction.min(1.0 - val_fraction)).ceil() as usize,
            });
        }

        let n_train = n - n_val;
        let (x_train, x_val) = self.x.view().split_at(Axis(0), n_train);
        let (y_train, y_val) = self.y.view().split_at(Axis(0), n_train);

        Ok((
            Self { x: x_train.to_owned(), y: y_train.to_owned() },
            Self { x: x_val.to_owned(), y: y_val.to_owned() },
        ))
    }

    /// Iterates `(x, y)` mini-batches of at most `batch_size` rows.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        self.x
            .axis_chunks_iter(Axis(0), batch_size)
            .zip(self.y.axis_chunks_iter(Axis(0), batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dataset(n: usize) -> TensorDataset {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32);
        let y = Array2::from_shape_fn((n, 1), |(i, _)| i as f32);
        TensorDataset::new(x, y).unwrap()
    }

    #[test]
    fn batches_cover_every_row_once() {
        let ds = dataset(10);
        let mut rows = 0;
        for (xb, yb) in ds.batches(3) {
            assert_eq!(xb.nrows(), yb.nrows());
            rows += xb.nrows();
        }
        assert_eq!(rows, 10);
    }

    #[test]
    fn shuffle_keeps_rows_paired() {
        let mut ds = dataset(20);
        let mut rng = StdRng::seed_from_u64(9);
        ds.shuffle(&mut rng);

        // x row [2i, 2i+1] must still map to y row [i].
        for i in 0..ds.len() {
            let label = ds.y()[[i, 0]];
            assert_eq!(ds.x()[[i, 0]], label * 2.0);
        }
    }

    #[test]
    fn split_respects_fraction() {
        let (train, val) = dataset(10).split(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
    }

    #[test]
    fn split_rejects_degenerate_fractions() {
        assert!(dataset(3).split(0.01).is_err());
        assert!(dataset(3).split(0.99).is_err());
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let res = TensorDataset::new(array![[1.0]], Array2::zeros((2, 3)));
        assert!(matches!(res, Err(EstimatorError::WidthMismatch { .. })));
    }
}
