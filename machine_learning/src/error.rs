use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    RankMismatch {
        layer: &'static str,
        got: usize,
        expected: usize,
    },
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    MissingForwardCache {
        layer: &'static str,
    },
    Shape(ShapeError),
    InvalidInit(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::RankMismatch {
                layer,
                got,
                expected,
            } => format!("The {layer} layer expects a rank {expected} input, got rank {got}"),
            MlErr::LabelOutOfRange { label, classes } => {
                format!("Label {label} is out of range for a model with {classes} classes")
            }
            MlErr::MissingForwardCache { layer } => format!(
                "Tried to backpropagate through the {layer} layer without a tracked forward pass"
            ),
            MlErr::Shape(e) => format!("Invalid array shape: {e}"),
            MlErr::InvalidInit(detail) => format!("Invalid parameter initialization: {detail}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::InvalidInit(value.to_string())
    }
}
