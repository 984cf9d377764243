use ndarray::{Array2, ArrayView2};

use super::LossFn;
use crate::{MlErr, Result};

/// Negative log likelihood loss, averaged over the batch.
///
/// Expects `y_pred` to hold log-probabilities (the output of a `LogSoftmax` layer).
#[derive(Default, Clone, Copy, Debug)]
pub struct NllLoss;

impl NllLoss {
    /// Returns a new `NllLoss`.
    pub fn new() -> Self {
        Self
    }

    fn check(y_pred: &ArrayView2<f32>, y: &[usize]) -> Result<()> {
        if y_pred.nrows() == 0 || y_pred.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        let classes = y_pred.ncols();
        if let Some(&label) = y.iter().find(|&&label| label >= classes) {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }

        Ok(())
    }
}

impl LossFn for NllLoss {
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32> {
        Self::check(&y_pred, y)?;

        let picked: f32 = y.iter().enumerate().map(|(i, &label)| y_pred[[i, label]]).sum();
        Ok(-picked / y.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>> {
        Self::check(&y_pred, y)?;

        let scale = -1.0 / y.len() as f32;
        let mut d = Array2::zeros(y_pred.raw_dim());
        for (i, &label) in y.iter().enumerate() {
            d[[i, label]] = scale;
        }

        Ok(d)
    }
}
