mod adam;
mod classifier;
mod error;
mod linear;

pub use adam::Adam;
pub use classifier::{
    ArtifactFile, ClassifierEngine, Distribution, ModelArtifact, ModelShape, TrainingSet,
};
pub use error::{EngineErr, Result};
pub use linear::{LinearEngine, LinearModel};
