pub mod checkpoint;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod metrics;
pub mod model;
pub mod summary;
pub mod train;

pub use config::{Args, RunConfig};
pub use data::DatasetKind;
pub use device::{Device, DevicePreference};
pub use error::{Result, TrainErr};
pub use train::{Driver, RunReport, run};
