use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;

use crate::{DatasetKind, DevicePreference, Result, TrainErr};

/// Where the trained parameters are saved, relative to the working directory.
pub const CHECKPOINT_FILE: &str = "mnist_cnn.pt";

/// Command line flags of the `mnist` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "mnist", about = "FashionMNIST CNN training example")]
pub struct Args {
    /// input batch size for training
    #[arg(long, default_value_t = 64, value_name = "N")]
    pub batch_size: usize,

    /// input batch size for testing
    #[arg(long, default_value_t = 1000, value_name = "N")]
    pub test_batch_size: usize,

    /// number of epochs to train
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub epochs: usize,

    /// learning rate
    #[arg(long, default_value_t = 0.01, value_name = "LR")]
    pub lr: f32,

    /// SGD momentum
    #[arg(long, default_value_t = 0.5, value_name = "M")]
    pub momentum: f32,

    /// disables CUDA training
    #[arg(long)]
    pub no_cuda: bool,

    /// device to train on
    #[arg(long, value_enum, default_value_t = DevicePreference::Auto)]
    pub device: DevicePreference,

    /// random seed
    #[arg(long, default_value_t = 1, value_name = "S")]
    pub seed: u64,

    /// how many batches to wait before logging training status
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub log_interval: usize,

    /// for saving the current model
    #[arg(long)]
    pub save_model: bool,

    /// directory where summary logs are stored
    #[arg(long, default_value = "logs", value_name = "L")]
    pub dir: PathBuf,

    /// dataset to train on
    #[arg(long, value_enum, default_value_t = DatasetKind::FashionMnist)]
    pub dataset: DatasetKind,

    /// root directory datasets are cached in
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}

/// Immutable hyperparameters of a training run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub batch_size: NonZeroUsize,
    pub test_batch_size: NonZeroUsize,
    pub epochs: usize,
    pub lr: f32,
    pub momentum: f32,
    pub no_cuda: bool,
    pub device: DevicePreference,
    pub seed: u64,
    pub log_interval: NonZeroUsize,
    pub save_model: bool,
    pub dir: PathBuf,
    pub dataset: DatasetKind,
    pub data_dir: PathBuf,
    pub checkpoint: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        let args = Args::parse_from(["mnist"]);
        Self::try_from(args).unwrap_or_else(|_| unreachable!("the default flags are valid"))
    }
}

impl TryFrom<Args> for RunConfig {
    type Error = TrainErr;

    fn try_from(args: Args) -> Result<Self> {
        let non_zero = |what: &str, n: usize| {
            NonZeroUsize::new(n)
                .ok_or_else(|| TrainErr::InvalidConfig(format!("{what} must be greater than 0")))
        };

        if !args.lr.is_finite() || !args.momentum.is_finite() {
            return Err(TrainErr::InvalidConfig(
                "the learning rate and momentum must be finite".into(),
            ));
        }

        Ok(Self {
            batch_size: non_zero("--batch-size", args.batch_size)?,
            test_batch_size: non_zero("--test-batch-size", args.test_batch_size)?,
            epochs: args.epochs,
            lr: args.lr,
            momentum: args.momentum,
            no_cuda: args.no_cuda,
            device: args.device,
            seed: args.seed,
            log_interval: non_zero("--log-interval", args.log_interval)?,
            save_model: args.save_model,
            dir: args.dir,
            dataset: args.dataset,
            data_dir: args.data_dir,
            checkpoint: PathBuf::from(CHECKPOINT_FILE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::default();

        assert_eq!(config.batch_size.get(), 64);
        assert_eq!(config.test_batch_size.get(), 1000);
        assert_eq!(config.epochs, 1);
        assert_eq!(config.lr, 0.01);
        assert_eq!(config.momentum, 0.5);
        assert!(!config.no_cuda);
        assert_eq!(config.seed, 1);
        assert_eq!(config.log_interval.get(), 10);
        assert!(!config.save_model);
        assert_eq!(config.dir, PathBuf::from("logs"));
        assert_eq!(config.dataset, DatasetKind::FashionMnist);
        assert_eq!(config.checkpoint, PathBuf::from("mnist_cnn.pt"));
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "mnist",
            "--epochs",
            "2",
            "--no-cuda",
            "--save-model",
            "--lr",
            "0.1",
            "--dataset",
            "mnist",
        ]);
        let config = RunConfig::try_from(args).unwrap();

        assert_eq!(config.epochs, 2);
        assert!(config.no_cuda);
        assert!(config.save_model);
        assert_eq!(config.lr, 0.1);
        assert_eq!(config.dataset, DatasetKind::Mnist);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let args = Args::parse_from(["mnist", "--batch-size", "0"]);
        assert!(matches!(
            RunConfig::try_from(args),
            Err(TrainErr::InvalidConfig(_))
        ));
    }
}
