use ndarray::{
    Array2, Array4, ArrayD, ArrayView1, ArrayView2, ArrayView4, ArrayViewMut1, ArrayViewMut2,
    Axis, Ix4, linalg, parallel::prelude::*,
};

use super::{ParamShape, check_rank};
use crate::{MlErr, Result};

/// A 2D convolution with unit stride and no padding.
///
/// The convolution is lowered to a matrix product: every receptive field of the input is
/// unrolled into a row of a *columns* matrix (im2col), which is then multiplied by the
/// flattened kernels. The columns are kept between the forward and backward passes.
///
/// Parameters are laid out as the kernels `[out, in, k, k]` followed by the biases `[out]`.
#[derive(Clone, Debug)]
pub struct Conv2d {
    name: String,
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    size: usize,

    // Forward metadata
    cols: Option<Array2<f32>>,
    input_dim: Option<(usize, usize, usize, usize)>,
}

impl Conv2d {
    /// Creates a new `Conv2d` layer.
    ///
    /// # Arguments
    /// * `name` - The name used to address this layer's parameters.
    /// * `channels` - The amount of (input, output) channels.
    /// * `kernel` - The side of the square kernel.
    ///
    /// # Returns
    /// A new `Conv2d` instance.
    pub fn new(name: impl Into<String>, channels: (usize, usize), kernel: usize) -> Self {
        let (in_channels, out_channels) = channels;

        Self {
            name: name.into(),
            in_channels,
            out_channels,
            kernel,
            size: out_channels * in_channels * kernel * kernel + out_channels,
            cols: None,
            input_dim: None,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of inputs feeding each output unit.
    pub fn fan_in(&self) -> usize {
        self.in_channels * self.kernel * self.kernel
    }

    /// Returns the names and shapes of the weights and biases of this layer.
    pub fn param_shapes(&self) -> Vec<ParamShape> {
        let k = self.kernel;

        vec![
            ParamShape::new(
                format!("{}.weight", self.name),
                vec![self.out_channels, self.in_channels, k, k],
            ),
            ParamShape::new(format!("{}.bias", self.name), vec![self.out_channels]),
        ]
    }

    /// Convolves `x` and keeps the unrolled input for a later `backward` call.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `x` - The input, shaped `[batch, channels, height, width]`.
    ///
    /// # Returns
    /// The feature maps, shaped `[batch, out_channels, height - k + 1, width - k + 1]`.
    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self.check_input(x)?;
        let dim = x.dim();
        let cols = self.im2col(x.view());
        let y = self.convolve(params, &cols, dim)?;

        self.cols = Some(cols);
        self.input_dim = Some(dim);
        Ok(y)
    }

    /// Convolves `x` without keeping any metadata.
    pub fn infer(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self.check_input(x)?;
        let dim = x.dim();
        let cols = self.im2col(x.view());
        self.convolve(params, &cols, dim)
    }

    /// Accumulates the gradient of this layer's parameters into `grad` and returns the delta
    /// with respect to the input of the last tracked forward pass.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let (Some(cols), Some(dim)) = (self.cols.take(), self.input_dim.take()) else {
            return Err(MlErr::MissingForwardCache { layer: "conv2d" });
        };

        let (n, c, h, w) = dim;
        let (oh, ow) = self.output_hw(h, w)?;
        let k = self.kernel;

        let d = d.into_dimensionality::<Ix4>()?;
        let d = d
            .permuted_axes([0, 2, 3, 1])
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n * oh * ow, self.out_channels))?;

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &d.t(), &cols, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (weights, _) = self.view_params(params)?;
        let dcols = d.dot(&weights);

        let mut dx = Array4::<f32>::zeros(dim);
        dx.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(dcols.axis_chunks_iter(Axis(0), oh * ow).into_par_iter())
            .for_each(|(mut sample, rows)| {
                for i in 0..oh {
                    for j in 0..ow {
                        let row = rows.row(i * ow + j);
                        for ch in 0..c {
                            for ki in 0..k {
                                for kj in 0..k {
                                    sample[[ch, i + ki, j + kj]] += row[(ch * k + ki) * k + kj];
                                }
                            }
                        }
                    }
                }
            });

        Ok(dx.into_dyn())
    }

    fn check_input(&self, x: ArrayD<f32>) -> Result<Array4<f32>> {
        check_rank("conv2d", x.ndim(), 4)?;
        let x = x.into_dimensionality::<Ix4>()?;

        if x.dim().1 != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input channels",
                got: x.dim().1,
                expected: self.in_channels,
            });
        }

        let (_, _, h, w) = x.dim();
        self.output_hw(h, w)?;
        Ok(x)
    }

    fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let k = self.kernel;

        if h < k || w < k {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input side",
                got: h.min(w),
                expected: k,
            });
        }

        Ok((h - k + 1, w - k + 1))
    }

    fn convolve(
        &self,
        params: &[f32],
        cols: &Array2<f32>,
        (n, _, h, w): (usize, usize, usize, usize),
    ) -> Result<ArrayD<f32>> {
        let (oh, ow) = self.output_hw(h, w)?;
        let (weights, biases) = self.view_params(params)?;

        let mut out = Array2::zeros((cols.nrows(), self.out_channels));
        linalg::general_mat_mul(1.0, cols, &weights.t(), 0.0, &mut out);
        out += &biases;

        let out = out
            .into_shape_with_order((n, oh, ow, self.out_channels))?
            .permuted_axes([0, 3, 1, 2]);

        Ok(out.as_standard_layout().into_owned().into_dyn())
    }

    /// Unrolls every `k x k` receptive field of every channel into a row, one sample at a time.
    fn im2col(&self, x: ArrayView4<f32>) -> Array2<f32> {
        let (n, c, h, w) = x.dim();
        let k = self.kernel;
        let (oh, ow) = (h - k + 1, w - k + 1);

        let mut cols = Array2::zeros((n * oh * ow, c * k * k));
        cols.axis_chunks_iter_mut(Axis(0), oh * ow)
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut rows, sample)| {
                for i in 0..oh {
                    for j in 0..ow {
                        let mut row = rows.row_mut(i * ow + j);
                        for ch in 0..c {
                            for ki in 0..k {
                                for kj in 0..k {
                                    row[(ch * k + ki) * k + kj] = sample[[ch, i + ki, j + kj]];
                                }
                            }
                        }
                    }
                }
            });

        cols
    }

    /// Gives a view of the raw parameter slice as the flattened kernels and the biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "conv2d params",
                got: params.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.out_channels;
        let kernels =
            ArrayView2::from_shape((self.out_channels, self.fan_in()), &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.out_channels, &params[w_size..])?;
        Ok((kernels, biases))
    }

    /// Gives a view of the raw gradient slice as the kernels' and biases' deltas.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        if grad.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "conv2d grad",
                got: grad.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.out_channels;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape((self.out_channels, self.fan_in()), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.out_channels, db_raw)?;
        Ok((dw, db))
    }
}
