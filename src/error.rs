use std::{error::Error, fmt, io};

use crate::{config::ConfigErr, engine::EngineErr};

/// The session's result type.
pub type Result<T> = std::result::Result<T, GestureErr>;

/// Why a sample was not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    UnknownLabel(String),
    FeatureWidth { got: usize, expected: usize },
    NoHand,
    TrainingInProgress,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLabel(label) => write!(f, "unknown label '{label}'"),
            Self::FeatureWidth { got, expected } => {
                write!(f, "feature vector has {got} values, expected {expected}")
            }
            Self::NoHand => f.write_str("no hand in view"),
            Self::TrainingInProgress => f.write_str("samples are frozen while training"),
        }
    }
}

/// Every failure a recognition session can report. None of them is fatal:
/// the session keeps running and the message becomes the status line.
#[derive(Debug)]
pub enum GestureErr {
    /// Training was requested with fewer samples than configured.
    InsufficientSamples { got: usize, required: usize },
    /// A second training was requested while one is still running.
    TrainingInProgress,
    /// The command needs an active model and there is none.
    NoModel,
    /// The engine failed to fit a model; the previous model is kept.
    Training(EngineErr),
    /// The engine failed on a single inference tick.
    Inference(EngineErr),
    /// An artifact could not be turned into a usable model.
    ModelLoad(EngineErr),
    /// The engine failed to serialize the active model.
    ModelSave(EngineErr),
    /// A sample was dropped.
    RecordRejected(RejectReason),
    Config(ConfigErr),
    Io(io::Error),
}

impl fmt::Display for GestureErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientSamples { got, required } => {
                write!(f, "not enough samples: {got} of {required}")
            }
            Self::TrainingInProgress => f.write_str("training already in progress"),
            Self::NoModel => f.write_str("no model loaded"),
            Self::Training(e) => write!(f, "training failed: {e}"),
            Self::Inference(e) => write!(f, "inference failed: {e}"),
            Self::ModelLoad(e) => write!(f, "model load failed: {e}"),
            Self::ModelSave(e) => write!(f, "model save failed: {e}"),
            Self::RecordRejected(reason) => write!(f, "sample rejected: {reason}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for GestureErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Training(e) | Self::Inference(e) | Self::ModelLoad(e) | Self::ModelSave(e) => {
                Some(e)
            }
            Self::Config(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for GestureErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigErr> for GestureErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<RejectReason> for GestureErr {
    fn from(value: RejectReason) -> Self {
        Self::RecordRejected(value)
    }
}
