use ndarray::{Array4, ArrayD, ArrayView4, Ix4};
use rayon::prelude::*;

use super::check_rank;
use crate::{MlErr, Result};

/// Max pooling over non-overlapping square windows (the stride equals the window side).
///
/// Trailing rows and columns that don't fill a whole window are dropped.
#[derive(Clone, Debug)]
pub struct MaxPool2d {
    kernel: usize,

    // Forward metadata: the flat input index each output was taken from.
    argmax: Option<(Vec<usize>, (usize, usize, usize, usize))>,
}

impl MaxPool2d {
    pub fn new(kernel: usize) -> Self {
        Self {
            kernel,
            argmax: None,
        }
    }

    pub fn forward(&mut self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self.check_input(x)?;
        let (y, argmax) = self.pool(x.view())?;
        self.argmax = Some((argmax, x.dim()));
        Ok(y.into_dyn())
    }

    pub fn infer(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self.check_input(x)?;
        Ok(self.pool(x.view())?.0.into_dyn())
    }

    /// Routes each incoming delta to the input position that won its window.
    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some((argmax, dim)) = self.argmax.take() else {
            return Err(MlErr::MissingForwardCache { layer: "max_pool2d" });
        };

        if d.len() != argmax.len() {
            return Err(MlErr::SizeMismatch {
                what: "max_pool2d delta",
                got: d.len(),
                expected: argmax.len(),
            });
        }

        let mut dx = vec![0.0; dim.0 * dim.1 * dim.2 * dim.3];
        for (g, &idx) in d.iter().zip(&argmax) {
            dx[idx] += g;
        }

        Ok(Array4::from_shape_vec(dim, dx)?.into_dyn())
    }

    fn check_input(&self, x: ArrayD<f32>) -> Result<Array4<f32>> {
        check_rank("max_pool2d", x.ndim(), 4)?;
        Ok(x.into_dimensionality::<Ix4>()?)
    }

    /// Pools every (sample, channel) plane in parallel.
    fn pool(&self, x: ArrayView4<f32>) -> Result<(Array4<f32>, Vec<usize>)> {
        let (n, c, h, w) = x.dim();
        let k = self.kernel;
        let (oh, ow) = (h / k, w / k);
        let plane_len = (oh * ow).max(1);

        let mut y = vec![0.0; n * c * oh * ow];
        let mut argmax = vec![0; y.len()];

        y.par_chunks_mut(plane_len)
            .zip(argmax.par_chunks_mut(plane_len))
            .enumerate()
            .for_each(|(plane, (ys, idxs))| {
                let (b, ch) = (plane / c, plane % c);
                let flat = |r: usize, col: usize| (plane * h + r) * w + col;

                for i in 0..oh {
                    for j in 0..ow {
                        let mut best = x[[b, ch, i * k, j * k]];
                        let mut best_idx = flat(i * k, j * k);

                        for r in i * k..(i + 1) * k {
                            for col in j * k..(j + 1) * k {
                                let v = x[[b, ch, r, col]];
                                if v > best {
                                    best = v;
                                    best_idx = flat(r, col);
                                }
                            }
                        }

                        ys[i * ow + j] = best;
                        idxs[i * ow + j] = best_idx;
                    }
                }
            });

        Ok((Array4::from_shape_vec((n, c, oh, ow), y)?, argmax))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn picks_window_maxima_and_routes_deltas_back() {
        let mut pool = MaxPool2d::new(2);
        #[rustfmt::skip]
        let x = Array::from_shape_vec(IxDyn(&[1, 1, 2, 4]), vec![
            1.0, 5.0, 2.0, 0.0,
            3.0, 4.0, 8.0, 7.0,
        ])
        .unwrap();

        let y = pool.forward(x).unwrap();
        assert_eq!(y.iter().copied().collect::<Vec<f32>>(), [5.0, 8.0]);

        let d = Array::from_shape_vec(IxDyn(&[1, 1, 1, 2]), vec![0.5, -1.0]).unwrap();
        let dx = pool.backward(d).unwrap();
        assert_eq!(
            dx.iter().copied().collect::<Vec<f32>>(),
            [0.0, 0.5, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0]
        );
    }

    #[test]
    fn odd_sides_drop_the_remainder() {
        let pool = MaxPool2d::new(2);
        let x = ArrayD::zeros(IxDyn(&[2, 3, 5, 5]));
        assert_eq!(pool.infer(x).unwrap().shape(), &[2, 3, 2, 2]);
    }
}
