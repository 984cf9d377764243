use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A loss over class predictions and integer class labels.
pub trait LossFn {
    /// Computes the loss of a batch of predictions.
    ///
    /// # Arguments
    /// * `y_pred` - The model output, one row per sample.
    /// * `y` - The expected class of each sample.
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32>;

    /// Computes the derivative of the loss with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>>;
}
