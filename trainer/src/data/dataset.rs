use ndarray::{Array4, ArrayD};

use crate::{Device, Result, TrainErr};

/// A labelled image dataset held in memory.
///
/// Images are single channel, stored back to back as `f32` pixels in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    images: Vec<f32>,
    labels: Vec<usize>,
    side: (usize, usize),
}

impl InMemoryDataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Arguments
    /// * `images` - Every image's pixels, row major, one image after the other.
    /// * `labels` - The class of every image.
    /// * `side` - The (rows, cols) of a single image.
    ///
    /// # Returns
    /// An error if the dataset is empty or the buffers don't hold the same amount of samples.
    pub fn new(images: Vec<f32>, labels: Vec<usize>, side: (usize, usize)) -> Result<Self> {
        let sample_len = side.0 * side.1;

        if labels.is_empty() || sample_len == 0 {
            return Err(TrainErr::InvalidConfig("the dataset must be non-empty".into()));
        }

        if images.len() != labels.len() * sample_len {
            return Err(TrainErr::InvalidConfig(format!(
                "{} labels need {} pixels, got {}",
                labels.len(),
                labels.len() * sample_len,
                images.len()
            )));
        }

        Ok(Self {
            images,
            labels,
            side,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the (rows, cols) of every image.
    #[inline]
    pub fn side(&self) -> (usize, usize) {
        self.side
    }

    #[inline]
    pub fn sample_len(&self) -> usize {
        self.side.0 * self.side.1
    }

    #[inline]
    pub fn images(&self) -> &[f32] {
        &self.images
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }
}

/// Borrowed batch view (zero-copy), tagged with the device it lives on.
#[derive(Debug, Clone, Copy)]
pub struct BatchRef<'a> {
    pub images: &'a [f32],
    pub labels: &'a [usize],
    pub side: (usize, usize),
    pub device: Device,
}

impl<'a> BatchRef<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Moves the batch to `device`.
    ///
    /// Host memory is the only memory the backend knows, so any other device fails.
    pub fn to(self, device: Device) -> Result<Self> {
        match device {
            Device::Cpu => Ok(Self { device, ..self }),
            other => Err(TrainErr::DeviceUnavailable(other.to_string())),
        }
    }

    /// Copies the images into a `[batch, 1, rows, cols]` array.
    pub fn input(&self) -> Result<ArrayD<f32>> {
        let (rows, cols) = self.side;
        let x = Array4::from_shape_vec((self.len(), 1, rows, cols), self.images.to_vec())
            .map_err(machine_learning::MlErr::from)?;

        Ok(x.into_dyn())
    }
}
