use std::{collections::HashMap, fs, path::Path};

use log::info;
use machine_learning::arch::Model;
use safetensors::{
    SafeTensors,
    tensor::{Dtype, TensorView},
};

use crate::{Result, TrainErr};

/// A named tensor read back from a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Saves the model parameters as a safetensors file, one `F32` tensor per parameter name.
///
/// # Arguments
/// * `path` - Where to write the checkpoint.
/// * `model` - The model the parameters belong to.
/// * `params` - The model's flat parameter buffer.
pub fn save<M: Model>(path: &Path, model: &M, params: &[f32]) -> Result<()> {
    if params.len() != model.size() {
        return Err(TrainErr::InvalidConfig(format!(
            "{} params for a model of size {}",
            params.len(),
            model.size()
        )));
    }

    let slots = model.param_slots();
    let views = slots
        .iter()
        .map(|slot| -> Result<(&str, TensorView<'_>)> {
            let bytes: &[u8] = bytemuck::cast_slice(&params[slot.range()]);
            let view = TensorView::new(Dtype::F32, slot.shape.clone(), bytes)?;
            Ok((slot.name.as_str(), view))
        })
        .collect::<Result<Vec<_>>>()?;

    safetensors::serialize_to_file(views, &None, path)?;
    info!("saved {} tensors to {}", slots.len(), path.display());
    Ok(())
}

/// Reads every tensor of a checkpoint.
pub fn load(path: &Path) -> Result<HashMap<String, Tensor>> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;

    tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            if view.dtype() != Dtype::F32 {
                return Err(TrainErr::InvalidDataset {
                    path: path.to_path_buf(),
                    detail: format!("tensor {name} is {:?}, expected F32", view.dtype()),
                });
            }

            let data = bytemuck::pod_collect_to_vec::<u8, f32>(view.data());
            let tensor = Tensor {
                shape: view.shape().to_vec(),
                data,
            };
            Ok((name, tensor))
        })
        .collect()
}

/// Rebuilds a model's flat parameter buffer from a checkpoint.
///
/// # Returns
/// An error if a parameter is missing or has the wrong shape.
pub fn load_params<M: Model>(path: &Path, model: &M) -> Result<Vec<f32>> {
    let mut tensors = load(path)?;
    let mut params = Vec::with_capacity(model.size());

    for slot in model.param_slots() {
        let invalid = |detail: String| TrainErr::InvalidDataset {
            path: path.to_path_buf(),
            detail,
        };

        let tensor = tensors
            .remove(&slot.name)
            .ok_or_else(|| invalid(format!("missing tensor {}", slot.name)))?;

        if tensor.shape != slot.shape {
            return Err(invalid(format!(
                "tensor {} has shape {:?}, expected {:?}",
                slot.name, tensor.shape, slot.shape
            )));
        }

        params.extend(tensor.data);
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::{Sequential, layers::Layer};

    use super::*;

    fn model() -> Sequential {
        Sequential::new([Layer::dense("fc1", (3, 2)), Layer::relu(), Layer::dense("fc2", (2, 1))])
    }

    #[test]
    fn tensors_are_named_and_shaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnist_cnn.pt");
        let model = model();
        let params: Vec<f32> = (0..model.size()).map(|i| i as f32).collect();

        save(&path, &model, &params).unwrap();
        let tensors = load(&path).unwrap();

        assert_eq!(tensors.len(), 4);
        assert_eq!(tensors["fc1.weight"].shape, [2, 3]);
        assert_eq!(tensors["fc1.bias"].data, [6., 7.]);
        assert_eq!(tensors["fc2.bias"].data, [10.]);
        assert_eq!(load_params(&path, &model).unwrap(), params);
    }

    #[test]
    fn fractional_values_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnist_cnn.pt");
        let model = model();
        let params: Vec<f32> = (0..model.size()).map(|i| -0.37 * i as f32 + 1e-3).collect();

        save(&path, &model, &params).unwrap();

        assert_eq!(load_params(&path, &model).unwrap(), params);
    }

    #[test]
    fn foreign_checkpoints_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.pt");
        let other = Sequential::new([Layer::dense("fc1", (1, 1))]);
        save(&path, &other, &[1., 2.]).unwrap();

        assert!(load_params(&path, &model()).is_err());
    }
}
