mod conv2d;
mod dense;
mod flatten;
mod layer;
mod log_softmax;
mod max_pool2d;
mod relu;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use flatten::Flatten;
pub use layer::Layer;
pub use log_softmax::LogSoftmax;
pub use max_pool2d::MaxPool2d;
pub use relu::Relu;

use crate::{MlErr, Result};

/// The name and shape of one of a layer's parameter tensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParamShape {
    pub fn new(name: String, shape: Vec<usize>) -> Self {
        Self { name, shape }
    }

    /// Returns the amount of scalars in the tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_rank(layer: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::RankMismatch {
            layer,
            got,
            expected,
        });
    }

    Ok(())
}
