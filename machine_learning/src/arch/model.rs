use ndarray::ArrayD;
use rand::Rng;

use crate::error::Result;

/// Where a named parameter tensor lives inside a model's flat parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    pub name: String,
    pub shape: Vec<usize>,
    pub offset: usize,
}

impl ParamSlot {
    /// Returns the amount of scalars in the tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the range of the flat buffer this tensor occupies.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }
}

/// A differentiable model whose parameters live outside of it, in a flat buffer.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the name, shape and position of every parameter tensor, in buffer order.
    fn param_slots(&self) -> Vec<ParamSlot>;

    /// Samples a fresh parameter buffer.
    ///
    /// # Arguments
    /// * `rng` - The random number generator driving the initialization.
    fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>>;

    /// Makes a forward pass, keeping what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch.
    ///
    /// # Returns
    /// The model output for the batch.
    fn forward(&mut self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>>;

    /// Makes a forward pass without tracking anything, the model is only borrowed.
    fn infer(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>>;

    /// Backpropagates `d`, the derivative of the loss with respect to the output of the last
    /// `forward` call, **accumulating** the gradient into `grad`.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: ArrayD<f32>) -> Result<()>;
}
