use std::{fmt, io};

/// The pipeline tool's result type.
pub type Result<T> = std::result::Result<T, PipelineErr>;

/// All errors that can occur while compiling or submitting a pipeline.
#[derive(Debug)]
pub enum PipelineErr {
    /// The pipeline graph can't be compiled.
    InvalidPipeline(String),
    /// The request never got a response.
    Http(reqwest::Error),
    /// The API answered with a non-success status.
    Api { status: u16, body: String },
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for PipelineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPipeline(msg) => write!(f, "invalid pipeline: {msg}"),
            Self::Http(e) => write!(f, "http error: {e}"),
            Self::Api { status, body } => write!(f, "pipeline api answered {status}: {body}"),
            Self::Yaml(e) => write!(f, "yaml error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for PipelineErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PipelineErr {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_yaml::Error> for PipelineErr {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e)
    }
}

impl From<serde_json::Error> for PipelineErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<io::Error> for PipelineErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<PipelineErr> for io::Error {
    fn from(value: PipelineErr) -> Self {
        match value {
            PipelineErr::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}
