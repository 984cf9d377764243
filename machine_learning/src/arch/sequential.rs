use std::mem;

use log::debug;
use ndarray::ArrayD;
use rand::Rng;

use super::{Model, ParamSlot, layers::Layer};
use crate::{MlErr, Result, initialization::{ParamGen, RandParamGen}};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// Each layer owns a contiguous slice of the parameter buffer, in layer order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn param_slots(&self) -> Vec<ParamSlot> {
        let mut offset = 0;

        self.layers
            .iter()
            .flat_map(|layer| layer.param_shapes())
            .map(|shape| {
                let slot = ParamSlot {
                    name: shape.name,
                    shape: shape.shape,
                    offset,
                };
                offset += slot.len();
                slot
            })
            .collect()
    }

    // Weights and biases are drawn from U(-1/sqrt(fan_in), 1/sqrt(fan_in)).
    fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = Vec::with_capacity(self.size());

        for layer in &self.layers {
            let (size, Some(fan_in)) = (layer.size(), layer.fan_in()) else {
                continue;
            };

            let mut param_gen = RandParamGen::fan_in_uniform(&mut *rng, size, fan_in)?;
            let sample = param_gen.sample(size).unwrap_or_default();
            params.extend(sample);
        }

        self.check_len("initial params", params.len())?;
        debug!("initialized {} parameters over {} layers", params.len(), self.layers.len());
        Ok(params)
    }

    fn forward(&mut self, params: &[f32], mut x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        self.check_len("params", params.len())?;
        let mut rest = params;

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.forward(head, x)?;
            rest = tail;
        }

        Ok(x)
    }

    fn infer(&self, params: &[f32], mut x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        self.check_len("params", params.len())?;
        let mut rest = params;

        for layer in self.layers.iter() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.infer(head, x)?;
            rest = tail;
        }

        Ok(x)
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], mut d: ArrayD<f32>) -> Result<()> {
        self.check_len("params", params.len())?;
        self.check_len("grad", grad.len())?;

        let mut params_rest = params;
        let mut grad_rest = grad;

        for layer in self.layers.iter_mut().rev() {
            let at = params_rest.len() - layer.size();

            let (params_head, layer_params) = params_rest.split_at(at);
            let (grad_head, layer_grad) = mem::take(&mut grad_rest).split_at_mut(at);

            d = layer.backward(layer_params, layer_grad, d)?;

            params_rest = params_head;
            grad_rest = grad_head;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::loss::{LossFn, NllLoss};
    use ndarray::{Array, Ix2, IxDyn};
    use rand::{SeedableRng, rngs::StdRng};

    fn tiny_cnn() -> Sequential {
        Sequential::new([
            Layer::conv2d("conv1", (1, 2), 3),
            Layer::relu(),
            Layer::max_pool2d(2),
            Layer::flatten(),
            Layer::dense("fc1", (8, 3)),
            Layer::log_softmax(),
        ])
    }

    fn batch() -> (ArrayD<f32>, Vec<usize>) {
        let x = Array::from_shape_fn(IxDyn(&[2, 1, 6, 6]), |idx| {
            let v = (idx[0] * 31 + idx[2] * 7 + idx[3] * 3) % 11;
            v as f32 / 10.0 - 0.5
        });
        (x, vec![2, 0])
    }

    fn loss_at(model: &Sequential, params: &[f32], x: &ArrayD<f32>, y: &[usize]) -> f32 {
        let out = model.infer(params, x.clone()).unwrap();
        let out = out.into_dimensionality::<Ix2>().unwrap();
        NllLoss.loss(out.view(), y).unwrap()
    }

    #[test]
    fn param_slots_follow_layer_order() {
        let model = tiny_cnn();
        let slots = model.param_slots();

        let names: Vec<&str> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["conv1.weight", "conv1.bias", "fc1.weight", "fc1.bias"]);
        assert_eq!(slots[0].shape, [2, 1, 3, 3]);
        assert_eq!(slots[2].offset, 20);
        assert_eq!(slots[3].range(), 44..47);
        assert_eq!(model.size(), 47);
    }

    #[test]
    fn same_seed_same_params() {
        let model = tiny_cnn();
        let a = model.init_params(&mut StdRng::seed_from_u64(1)).unwrap();
        let b = model.init_params(&mut StdRng::seed_from_u64(1)).unwrap();
        let c = model.init_params(&mut StdRng::seed_from_u64(2)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let bound = 1.0 / 9f32.sqrt();
        assert!(a[..20].iter().all(|p| p.abs() <= bound));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let mut model = tiny_cnn();
        let params = model.init_params(&mut StdRng::seed_from_u64(7)).unwrap();
        let (x, y) = batch();

        let out = model.forward(&params, x.clone()).unwrap();
        let out = out.into_dimensionality::<Ix2>().unwrap();
        let d = NllLoss.loss_prime(out.view(), &y).unwrap();

        let mut grad = vec![0.0; model.size()];
        model.backward(&params, &mut grad, d.into_dyn()).unwrap();

        let eps = 1e-3;
        for i in (0..params.len()).step_by(5) {
            let mut plus = params.clone();
            plus[i] += eps;
            let mut minus = params.clone();
            minus[i] -= eps;

            let numeric =
                (loss_at(&model, &plus, &x, &y) - loss_at(&model, &minus, &x, &y)) / (2.0 * eps);
            assert!(
                (numeric - grad[i]).abs() < 5e-3,
                "param {i}: numeric {numeric} vs analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn wrong_param_count_is_rejected() {
        let mut model = tiny_cnn();
        let (x, _) = batch();

        assert!(matches!(
            model.forward(&[0.0; 3], x),
            Err(MlErr::SizeMismatch { what: "params", .. })
        ));
    }
}
