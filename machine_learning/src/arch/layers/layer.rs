use ndarray::ArrayD;

use super::{Conv2d, Dense, Flatten, LogSoftmax, MaxPool2d, ParamShape, Relu};
use crate::Result;

#[derive(Clone, Debug)]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Relu(Relu),
    Flatten(Flatten),
    Dense(Dense),
    LogSoftmax(LogSoftmax),
}

impl Layer {
    pub fn conv2d(name: impl Into<String>, channels: (usize, usize), kernel: usize) -> Self {
        Self::Conv2d(Conv2d::new(name, channels, kernel))
    }

    pub fn max_pool2d(kernel: usize) -> Self {
        Self::MaxPool2d(MaxPool2d::new(kernel))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    pub fn dense(name: impl Into<String>, dim: (usize, usize)) -> Self {
        Self::Dense(Dense::new(name, dim))
    }

    pub fn log_softmax() -> Self {
        Self::LogSoftmax(LogSoftmax::new())
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Self::Conv2d(l) => l.size(),
            Self::Dense(l) => l.size(),
            Self::MaxPool2d(_) | Self::Relu(_) | Self::Flatten(_) | Self::LogSoftmax(_) => 0,
        }
    }

    /// Returns the amount of inputs feeding each unit, for layers that have parameters.
    pub fn fan_in(&self) -> Option<usize> {
        match self {
            Self::Conv2d(l) => Some(l.fan_in()),
            Self::Dense(l) => Some(l.fan_in()),
            Self::MaxPool2d(_) | Self::Relu(_) | Self::Flatten(_) | Self::LogSoftmax(_) => None,
        }
    }

    pub fn param_shapes(&self) -> Vec<ParamShape> {
        match self {
            Self::Conv2d(l) => l.param_shapes(),
            Self::Dense(l) => l.param_shapes(),
            Self::MaxPool2d(_) | Self::Relu(_) | Self::Flatten(_) | Self::LogSoftmax(_) => {
                Vec::new()
            }
        }
    }

    /// Forwards `x`, keeping whatever the layer needs for its backward pass.
    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Self::Conv2d(l) => l.forward(params, x),
            Self::MaxPool2d(l) => l.forward(x),
            Self::Relu(l) => Ok(l.forward(x)),
            Self::Flatten(l) => l.forward(x),
            Self::Dense(l) => l.forward(params, x),
            Self::LogSoftmax(l) => l.forward(x),
        }
    }

    /// Forwards `x` without tracking anything.
    pub fn infer(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Self::Conv2d(l) => l.infer(params, x),
            Self::MaxPool2d(l) => l.infer(x),
            Self::Relu(l) => Ok(l.infer(x)),
            Self::Flatten(l) => l.infer(x),
            Self::Dense(l) => l.infer(params, x),
            Self::LogSoftmax(l) => l.infer(x),
        }
    }

    /// Accumulates this layer's gradient into `grad` and returns the delta for the previous layer.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        match self {
            Self::Conv2d(l) => l.backward(params, grad, d),
            Self::MaxPool2d(l) => l.backward(d),
            Self::Relu(l) => l.backward(d),
            Self::Flatten(l) => l.backward(d),
            Self::Dense(l) => l.backward(params, grad, d),
            Self::LogSoftmax(l) => l.backward(d),
        }
    }
}
