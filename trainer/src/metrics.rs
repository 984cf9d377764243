use std::fmt;

use crate::{Device, Result, summary::SummaryWriter};

/// The training state reported every `log_interval` batches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSnapshot {
    pub epoch: usize,
    pub batch_idx: usize,
    pub batch_len: usize,
    pub dataset_len: usize,
    pub num_batches: usize,
    pub loss: f32,
    /// Where the batch was when it went through the model.
    pub device: Device,
}

impl MetricSnapshot {
    /// The amount of samples seen before this batch, within the epoch.
    pub fn samples_seen(&self) -> usize {
        self.batch_idx * self.batch_len
    }

    pub fn percent(&self) -> f64 {
        100. * self.batch_idx as f64 / self.num_batches as f64
    }

    /// The global position of this batch across epochs.
    pub fn step(&self) -> usize {
        self.epoch * self.num_batches + self.batch_idx
    }
}

impl fmt::Display for MetricSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Train Epoch: {} [{}/{} ({:.0}%)]\tloss={:.4}",
            self.epoch,
            self.samples_seen(),
            self.dataset_len,
            self.percent(),
            self.loss
        )
    }
}

/// Receives the metrics a run emits.
pub trait MetricSink {
    /// Reports the training state at a logged batch.
    fn snapshot(&mut self, snapshot: &MetricSnapshot) -> Result<()>;

    /// Reports the accuracy of the final evaluation pass.
    fn accuracy(&mut self, accuracy: f32) -> Result<()>;
}

impl<S: MetricSink + ?Sized> MetricSink for &mut S {
    fn snapshot(&mut self, snapshot: &MetricSnapshot) -> Result<()> {
        (**self).snapshot(snapshot)
    }

    fn accuracy(&mut self, accuracy: f32) -> Result<()> {
        (**self).accuracy(accuracy)
    }
}

/// Prints metrics to stdout, where the orchestrator's metric collector picks them up, and
/// mirrors them into the summary logs.
#[derive(Debug)]
pub struct ConsoleSink {
    summary: SummaryWriter,
}

impl ConsoleSink {
    pub fn new(summary: SummaryWriter) -> Self {
        Self { summary }
    }
}

impl MetricSink for ConsoleSink {
    fn snapshot(&mut self, snapshot: &MetricSnapshot) -> Result<()> {
        println!("{snapshot}");
        self.summary.add_scalar("loss", snapshot.step(), snapshot.loss)
    }

    fn accuracy(&mut self, accuracy: f32) -> Result<()> {
        println!("accuracy={accuracy:.4}");
        self.summary.add_scalar("accuracy", 0, accuracy)
    }
}

/// Keeps every emitted metric in memory.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub snapshots: Vec<MetricSnapshot>,
    pub accuracy: Option<f32>,
}

impl MetricSink for Recorder {
    fn snapshot(&mut self, snapshot: &MetricSnapshot) -> Result<()> {
        self.snapshots.push(*snapshot);
        Ok(())
    }

    fn accuracy(&mut self, accuracy: f32) -> Result<()> {
        self.accuracy = Some(accuracy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(batch_idx: usize) -> MetricSnapshot {
        MetricSnapshot {
            epoch: 1,
            batch_idx,
            batch_len: 64,
            dataset_len: 60000,
            num_batches: 938,
            loss: 2.302585,
            device: Device::Cpu,
        }
    }

    #[test]
    fn console_line_format() {
        assert_eq!(
            snapshot(0).to_string(),
            "Train Epoch: 1 [0/60000 (0%)]\tloss=2.3026"
        );
        assert_eq!(
            snapshot(10).to_string(),
            "Train Epoch: 1 [640/60000 (1%)]\tloss=2.3026"
        );
    }

    #[test]
    fn step_counts_across_epochs() {
        assert_eq!(snapshot(10).step(), 948);
    }
}
