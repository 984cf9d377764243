use ndarray::{linalg, prelude::*};

use super::{ParamShape, check_rank};
use crate::{MlErr, Result};

/// A fully connected layer computing `x · Wᵀ + b`.
///
/// Parameters are laid out as the weights `[out, in]` followed by the biases `[out]`.
#[derive(Clone, Debug)]
pub struct Dense {
    name: String,
    dim: (usize, usize),
    size: usize,

    // Forward metadata
    x: Option<Array2<f32>>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `name` - The name used to address this layer's parameters.
    /// * `dim` - The amount of (input, output) units.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(name: impl Into<String>, dim: (usize, usize)) -> Self {
        Self {
            name: name.into(),
            dim,
            size: (dim.0 + 1) * dim.1,
            x: None,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fan_in(&self) -> usize {
        self.dim.0
    }

    pub fn param_shapes(&self) -> Vec<ParamShape> {
        vec![
            ParamShape::new(format!("{}.weight", self.name), vec![self.dim.1, self.dim.0]),
            ParamShape::new(format!("{}.bias", self.name), vec![self.dim.1]),
        ]
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self.check_input(x)?;
        let z = self.affine(params, x.view())?;
        self.x = Some(x);
        Ok(z.into_dyn())
    }

    pub fn infer(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self.check_input(x)?;
        Ok(self.affine(params, x.view())?.into_dyn())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let Some(x) = self.x.take() else {
            return Err(MlErr::MissingForwardCache { layer: "dense" });
        };

        let d = d.into_dimensionality::<Ix2>()?;

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &d.t(), &x, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w).into_dyn())
    }

    fn check_input(&self, x: ArrayD<f32>) -> Result<Array2<f32>> {
        check_rank("dense", x.ndim(), 2)?;
        let x = x.into_dimensionality::<Ix2>()?;

        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        Ok(x)
    }

    fn affine(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (w, b) = self.view_params(params)?;

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w.t(), 0.0, &mut z);
        z += &b;
        Ok(z)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        if grad.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense grad",
                got: grad.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape((self.dim.1, self.dim.0), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense params",
                got: params.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape((self.dim.1, self.dim.0), &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_uses_out_by_in_weights() {
        let dense = Dense::new("fc", (2, 1));
        let params = [2.0, 3.0, 1.0];
        let x = array![[1.0, 1.0], [0.0, 2.0]].into_dyn();

        let y = dense.infer(&params, x).unwrap();

        assert_eq!(y, array![[6.0f32], [7.0]].into_dyn());
    }

    #[test]
    fn backward_accumulates_into_grad() {
        let mut dense = Dense::new("fc", (1, 1));
        let params = [2.0, 0.0];
        let mut grad = [0.0; 2];

        for _ in 0..2 {
            let x = array![[3.0]].into_dyn();
            dense.forward(&params, x).unwrap();
            let dx = dense.backward(&params, &mut grad, array![[1.0]].into_dyn()).unwrap();
            assert_eq!(dx, array![[2.0f32]].into_dyn());
        }

        assert_eq!(grad, [6.0, 2.0]);
    }
}
