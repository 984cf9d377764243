use std::{num::NonZeroUsize, path::Path};

use log::{debug, info};
use machine_learning::{
    arch::{Model, loss::NllLoss},
    optimization::{GradientDescentWithMomentum, Optimizer},
    training::ModelTrainer,
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Device, Result, RunConfig, TrainErr, checkpoint,
    data::{DataLoader, InMemoryDataset},
    metrics::{MetricSink, MetricSnapshot},
    model::mnist_net,
};

/// Drives the training and evaluation of a model over borrowed datasets.
pub struct Driver<M, O, S>
where
    M: Model,
    O: Optimizer,
    S: MetricSink,
{
    trainer: ModelTrainer<M, O, NllLoss>,
    params: Vec<f32>,
    device: Device,
    log_interval: NonZeroUsize,
    sink: S,
}

impl<M, O, S> Driver<M, O, S>
where
    M: Model,
    O: Optimizer,
    S: MetricSink,
{
    /// Creates a new `Driver`.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `optimizer` - The optimizer updating the parameters after every batch.
    /// * `params` - The initial parameters, as many as the model has.
    /// * `device` - The device every batch is moved to.
    /// * `log_interval` - How many batches to wait between snapshots.
    /// * `sink` - Where metrics are emitted.
    pub fn new(
        model: M,
        optimizer: O,
        params: Vec<f32>,
        device: Device,
        log_interval: NonZeroUsize,
        sink: S,
    ) -> Result<Self> {
        if params.len() != model.size() {
            return Err(TrainErr::InvalidConfig(format!(
                "got {} initial params for a model of size {}",
                params.len(),
                model.size()
            )));
        }

        Ok(Self {
            trainer: ModelTrainer::new(model, optimizer, NllLoss),
            params,
            device,
            log_interval,
            sink,
        })
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Returns the amount of optimizer steps taken so far.
    pub fn steps(&self) -> usize {
        self.trainer.steps()
    }

    /// Trains over every batch of `loader` once, in order.
    ///
    /// # Arguments
    /// * `epoch` - The 1-based epoch number, used in the snapshots.
    /// * `loader` - The training batches.
    pub fn train_epoch(&mut self, epoch: usize, loader: DataLoader<'_>) -> Result<()> {
        let num_batches = loader.num_batches();
        let dataset_len = loader.dataset_len();

        for (batch_idx, batch) in loader.enumerate() {
            let batch = if batch.device == self.device {
                batch
            } else {
                batch.to(self.device)?
            };

            let loss = self
                .trainer
                .train_batch(&mut self.params, batch.input()?, batch.labels)?;

            if batch_idx % self.log_interval.get() == 0 {
                self.sink.snapshot(&MetricSnapshot {
                    epoch,
                    batch_idx,
                    batch_len: batch.len(),
                    dataset_len,
                    num_batches,
                    loss,
                    device: batch.device,
                })?;
            }
        }

        Ok(())
    }

    /// Evaluates the model over every batch of `loader` and emits the accuracy.
    ///
    /// # Returns
    /// The fraction of samples whose most likely class is their label.
    pub fn test(&mut self, loader: DataLoader<'_>) -> Result<f32> {
        let dataset_len = loader.dataset_len();
        let mut correct = 0;
        let mut loss_sum = 0.;

        for batch in loader {
            let batch = if batch.device == self.device {
                batch
            } else {
                batch.to(self.device)?
            };

            let eval = self
                .trainer
                .evaluate_batch(&self.params, batch.input()?, batch.labels)?;

            correct += eval.correct;
            loss_sum += eval.loss_sum;
        }

        debug!("test loss {:.4}", loss_sum / dataset_len as f32);

        let accuracy = correct as f32 / dataset_len as f32;
        self.sink.accuracy(accuracy)?;
        Ok(accuracy)
    }

    /// Saves the current parameters to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        checkpoint::save(path, self.trainer.model(), &self.params)
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps: usize,
    pub accuracy: Option<f32>,
    pub params: Vec<f32>,
}

/// Trains the MNIST classifier for `config.epochs` epochs and, when asked to save the model,
/// saves it and evaluates it on the test set.
///
/// # Arguments
/// * `config` - The run's hyperparameters.
/// * `device` - The device the run uses.
/// * `train_set` - The training samples, visited in order.
/// * `test_set` - The evaluation samples.
/// * `sink` - Where metrics are emitted.
pub fn run<S: MetricSink>(
    config: &RunConfig,
    device: Device,
    train_set: &InMemoryDataset,
    test_set: &InMemoryDataset,
    sink: S,
) -> Result<RunReport> {
    let model = mnist_net();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let params = model.init_params(&mut rng)?;
    let optimizer = GradientDescentWithMomentum::new(model.size(), config.lr, config.momentum);

    info!(
        "training {} params on {device} for {} epoch(s)",
        model.size(),
        config.epochs
    );

    let mut driver = Driver::new(model, optimizer, params, device, config.log_interval, sink)?;

    for epoch in 1..=config.epochs {
        let loader = DataLoader::new(train_set, config.batch_size.get());
        driver.train_epoch(epoch, loader)?;
    }

    let mut accuracy = None;
    if config.save_model {
        driver.save(&config.checkpoint)?;

        let loader = DataLoader::new(test_set, config.test_batch_size.get());
        accuracy = Some(driver.test(loader)?);
    }

    Ok(RunReport {
        steps: driver.steps(),
        accuracy,
        params: driver.params,
    })
}
