use ndarray::ArrayD;

use crate::{MlErr, Result};

/// Rectified linear unit, applied element-wise to inputs of any rank.
#[derive(Clone, Debug, Default)]
pub struct Relu {
    a: Option<ArrayD<f32>>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>) -> ArrayD<f32> {
        let a = self.infer(x);
        self.a = Some(a.clone());
        a
    }

    pub fn infer(&self, x: ArrayD<f32>) -> ArrayD<f32> {
        x.mapv_into(|z| z.max(0.0))
    }

    pub fn backward(&mut self, mut d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(a) = self.a.take() else {
            return Err(MlErr::MissingForwardCache { layer: "relu" });
        };

        if d.shape() != a.shape() {
            return Err(MlErr::SizeMismatch {
                what: "relu delta",
                got: d.len(),
                expected: a.len(),
            });
        }

        d.zip_mut_with(&a, |d, &a| {
            if a <= 0.0 {
                *d = 0.0;
            }
        });

        Ok(d)
    }
}
