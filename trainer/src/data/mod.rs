pub mod dataloader;
pub mod dataset;
pub mod idx;
pub mod source;

pub use dataloader::DataLoader;
pub use dataset::{BatchRef, InMemoryDataset};
pub use source::{DatasetKind, Split};
