use ndarray::{ArrayD, ArrayView2, Axis, Ix2};

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    optimization::Optimizer,
};

/// The outcome of running a model over one batch without updating it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evaluation {
    /// The amount of samples whose most likely class matches the label.
    pub correct: usize,
    /// The sum of the per sample losses.
    pub loss_sum: f32,
}

/// A model `Trainer`. Contains the relevant components needed for training a model,
/// including the model itself and its gradient buffer.
pub struct ModelTrainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    grad: Vec<f32>,
    optimizer: O,
    loss_fn: L,
    model: M,
    steps: usize,
}

impl<M, O, L> ModelTrainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer applying the gradient to the parameters.
    /// * `loss_fn` - The loss function measuring the difference between a model's output
    ///   and the expected one.
    pub fn new(model: M, optimizer: O, loss_fn: L) -> Self {
        Self {
            grad: vec![0.; model.size()],
            model,
            optimizer,
            loss_fn,
            steps: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the amount of optimizer steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Runs one forward/backward cycle over a batch and takes one optimizer step.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, updated in place.
    /// * `x` - The input batch.
    /// * `y` - The class label of every sample in the batch.
    ///
    /// # Returns
    /// The mean loss of the batch, measured before the update.
    pub fn train_batch(&mut self, params: &mut [f32], x: ArrayD<f32>, y: &[usize]) -> Result<f32> {
        self.grad.fill(0.);

        let y_pred = into_logits(self.model.forward(params, x)?)?;
        let loss = self.loss_fn.loss(y_pred.view(), y)?;
        let d = self.loss_fn.loss_prime(y_pred.view(), y)?;

        self.model.backward(params, &mut self.grad, d.into_dyn())?;
        self.optimizer.update_params(&self.grad, params)?;
        self.steps += 1;

        Ok(loss)
    }

    /// Runs the model over a batch without tracking anything.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch.
    /// * `y` - The class label of every sample in the batch.
    pub fn evaluate_batch(
        &self,
        params: &[f32],
        x: ArrayD<f32>,
        y: &[usize],
    ) -> Result<Evaluation> {
        let y_pred = into_logits(self.model.infer(params, x)?)?;
        let loss = self.loss_fn.loss(y_pred.view(), y)?;

        let correct = argmax_rows(y_pred.view())
            .into_iter()
            .zip(y)
            .filter(|(pred, label)| pred == *label)
            .count();

        Ok(Evaluation {
            correct,
            loss_sum: loss * y.len() as f32,
        })
    }
}

fn into_logits(y_pred: ArrayD<f32>) -> Result<ndarray::Array2<f32>> {
    let ndim = y_pred.ndim();

    y_pred.into_dimensionality::<Ix2>().map_err(|_| MlErr::RankMismatch {
        layer: "output",
        got: ndim,
        expected: 2,
    })
}

/// The index of the largest value of every row, the first one wins on ties.
fn argmax_rows(y_pred: ArrayView2<'_, f32>) -> Vec<usize> {
    y_pred
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max { (i, v) } else { (best, max) }
                })
                .0
        })
        .collect()
}
