use ndarray::{Array2, ArrayD, Ix2, Zip};

use super::check_rank;
use crate::{MlErr, Result};

/// Row-wise `log(softmax(x))`, computed as `(x - max) - ln Σ exp(x - max)`.
#[derive(Clone, Debug, Default)]
pub struct LogSoftmax {
    y: Option<Array2<f32>>,
}

impl LogSoftmax {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let y = Self::log_softmax(x)?;
        self.y = Some(y.clone());
        Ok(y.into_dyn())
    }

    pub fn infer(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        Ok(Self::log_softmax(x)?.into_dyn())
    }

    /// `dx = d - softmax(x) * Σ d`, row by row.
    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(y) = self.y.take() else {
            return Err(MlErr::MissingForwardCache { layer: "log_softmax" });
        };

        let mut d = d.into_dimensionality::<Ix2>()?;
        if d.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "log_softmax delta",
                got: d.len(),
                expected: y.len(),
            });
        }

        Zip::from(d.rows_mut()).and(y.rows()).for_each(|mut d_row, y_row| {
            let total = d_row.sum();
            d_row.zip_mut_with(&y_row, |g, &y| *g -= y.exp() * total);
        });

        Ok(d.into_dyn())
    }

    fn log_softmax(x: ArrayD<f32>) -> Result<Array2<f32>> {
        check_rank("log_softmax", x.ndim(), 2)?;
        let mut y = x.into_dimensionality::<Ix2>()?;

        for mut row in y.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| v - max);
            let lse = row.mapv(f32::exp).sum().ln();
            row.mapv_inplace(|v| v - lse);
        }

        Ok(y)
    }
}
