pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod graph;
pub mod mnist;

pub use client::KfpClient;
pub use config::PipelineConfig;
pub use error::{PipelineErr, Result};
