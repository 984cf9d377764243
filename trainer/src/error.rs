use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;
use safetensors::SafeTensorError;

/// The trainer's result type.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Training driver failures. None of them are retried.
#[derive(Debug)]
pub enum TrainErr {
    Io(io::Error),
    InvalidConfig(String),
    /// The accelerator was requested explicitly but the backend has none.
    DeviceUnavailable(String),
    /// A dataset file exists but doesn't hold what it should.
    InvalidDataset {
        path: PathBuf,
        detail: String,
    },
    Download {
        url: String,
        source: reqwest::Error,
    },
    Checkpoint(SafeTensorError),
    Summary(serde_json::Error),
    Ml(MlErr),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Io(e) => write!(f, "io error: {e}"),
            TrainErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            TrainErr::DeviceUnavailable(device) => {
                write!(f, "device {device} was requested but is not available")
            }
            TrainErr::InvalidDataset { path, detail } => {
                write!(f, "invalid dataset file {}: {detail}", path.display())
            }
            TrainErr::Download { url, source } => write!(f, "failed to download {url}: {source}"),
            TrainErr::Checkpoint(e) => write!(f, "checkpoint error: {e}"),
            TrainErr::Summary(e) => write!(f, "failed to write summary: {e}"),
            TrainErr::Ml(e) => write!(f, "model error: {e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Io(e) => Some(e),
            TrainErr::Download { source, .. } => Some(source),
            TrainErr::Checkpoint(e) => Some(e),
            TrainErr::Summary(e) => Some(e),
            TrainErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for TrainErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<SafeTensorError> for TrainErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Checkpoint(value)
    }
}

impl From<serde_json::Error> for TrainErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Summary(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainErr> for io::Error {
    fn from(value: TrainErr) -> Self {
        match value {
            TrainErr::Io(e) => e,
            TrainErr::InvalidConfig(_) => io::Error::new(io::ErrorKind::InvalidInput, value),
            TrainErr::DeviceUnavailable(_) => io::Error::new(io::ErrorKind::Unsupported, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
