use ndarray::{ArrayD, IxDyn};

use crate::{MlErr, Result};

/// Collapses every axis but the first (the batch axis) into a single one.
#[derive(Clone, Debug, Default)]
pub struct Flatten {
    shape: Option<Vec<usize>>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape = x.shape().to_vec();
        let y = self.infer(x)?;
        self.shape = Some(shape);
        Ok(y)
    }

    pub fn infer(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(&n) = x.shape().first() else {
            return Err(MlErr::RankMismatch {
                layer: "flatten",
                got: 0,
                expected: 2,
            });
        };

        let rest = x.shape()[1..].iter().product::<usize>();
        let x = x.as_standard_layout().into_owned();
        Ok(x.into_shape_with_order((n, rest))?.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(shape) = self.shape.take() else {
            return Err(MlErr::MissingForwardCache { layer: "flatten" });
        };

        let d = d.as_standard_layout().into_owned();
        Ok(d.into_shape_with_order(IxDyn(&shape))?)
    }
}
