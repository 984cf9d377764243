use super::dataset::{BatchRef, InMemoryDataset};
use crate::Device;

/// DataLoader producing borrowed batches (zero-copy) in dataset order.
///
/// The last batch holds the remainder when the dataset length isn't a multiple of the batch size.
#[derive(Debug, Clone)]
pub struct DataLoader<'a> {
    dataset: &'a InMemoryDataset,
    batch_size: usize,
    cursor: usize,
}

impl<'a> DataLoader<'a> {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to go through.
    /// * `batch_size` - The maximum amount of samples per batch, must be non-zero.
    pub fn new(dataset: &'a InMemoryDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");

        Self {
            dataset,
            batch_size,
            cursor: 0,
        }
    }

    /// Returns the amount of samples in the underlying dataset.
    #[inline]
    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    /// Returns the amount of batches in a full pass, `ceil(len / batch_size)`.
    #[inline]
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Returns the next borrowed batch, or None if exhausted.
    pub fn next_batch(&mut self) -> Option<BatchRef<'a>> {
        if self.cursor >= self.dataset.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.dataset.len());
        let sample_len = self.dataset.sample_len();

        let images = &self.dataset.images()[self.cursor * sample_len..end * sample_len];
        let labels = &self.dataset.labels()[self.cursor..end];

        self.cursor = end;
        Some(BatchRef {
            images,
            labels,
            side: self.dataset.side(),
            device: Device::Cpu,
        })
    }
}

impl<'a> Iterator for DataLoader<'a> {
    type Item = BatchRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
