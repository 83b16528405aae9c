use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used by classifier engines.
pub type Result<T> = std::result::Result<T, EngineErr>;

/// Failures raised by a classifier engine while training, inferring or
/// (de)serializing a model.
#[derive(Debug)]
pub enum EngineErr {
    /// A shape invariant was violated (e.g. mismatched lengths).
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// An input is invalid for semantic reasons.
    InvalidInput(String),
    /// The training job observed its cancellation token.
    Cancelled,
    /// The training job died before returning a model.
    Aborted(String),
    /// A model artifact is missing one of its files.
    MissingFile(&'static str),
    /// A model artifact could not be (de)serialized.
    Serde(serde_json::Error),
}

impl Display for EngineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErr::ShapeMismatch { what, got, expected } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            EngineErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineErr::Cancelled => f.write_str("training cancelled"),
            EngineErr::Aborted(msg) => write!(f, "training aborted: {msg}"),
            EngineErr::MissingFile(kind) => write!(f, "model artifact has no {kind} file"),
            EngineErr::Serde(e) => write!(f, "malformed model artifact: {e}"),
        }
    }
}

impl Error for EngineErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineErr::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EngineErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}
