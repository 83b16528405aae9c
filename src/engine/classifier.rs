use tokio_util::sync::CancellationToken;

use super::Result;
use crate::landmarks::FeatureVector;

/// A supervised training set: parallel `features` and `targets` sequences.
///
/// `targets[i]` is the label index of `features[i]`, and indexes into `labels`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub labels: Vec<String>,
    pub features: Vec<FeatureVector>,
    pub targets: Vec<usize>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A probability per label index, as produced by an inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    probs: Vec<f32>,
}

impl Distribution {
    pub fn new(probs: Vec<f32>) -> Self {
        Self { probs }
    }

    pub fn probs(&self) -> &[f32] {
        &self.probs
    }

    /// Returns the most likely label index and its probability.
    ///
    /// # Returns
    /// `None` if the distribution is empty.
    pub fn best(&self) -> Option<(usize, f32)> {
        self.probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
    }
}

/// What a model expects as input and produces as output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelShape {
    pub inputs: usize,
    pub labels: Vec<String>,
}

/// A single named file of a persisted model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A persisted model: the set of files an engine writes on save and reads on
/// load. The layout of the files belongs to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelArtifact {
    pub files: Vec<ArtifactFile>,
}

impl ModelArtifact {
    /// Returns the first file whose name ends with `suffix`.
    pub fn find(&self, suffix: &str) -> Option<&ArtifactFile> {
        self.files.iter().find(|file| file.name.ends_with(suffix))
    }
}

/// Trains, runs and persists classification models.
///
/// Engines are shared between the session and its training job, so every
/// method takes `&self`; models are immutable once built.
pub trait ClassifierEngine: Send + Sync + 'static {
    type Model: Send + Sync + 'static;

    /// Fits a new model to `set`.
    ///
    /// Implementations should check `cancel` between epochs and stop with
    /// `EngineErr::Cancelled` once it fires.
    ///
    /// # Errors
    /// Returns `EngineErr` on malformed input shapes or cancellation.
    fn train(
        &self,
        set: &TrainingSet,
        epochs: usize,
        cancel: &CancellationToken,
    ) -> Result<Self::Model>;

    /// Computes the label distribution for one feature vector.
    ///
    /// # Errors
    /// Returns `EngineErr::ShapeMismatch` if `features` doesn't match the
    /// model's input width.
    fn infer(&self, model: &Self::Model, features: &[f32]) -> Result<Distribution>;

    /// Describes the input width and labels of `model`.
    fn shape(&self, model: &Self::Model) -> ModelShape;

    /// Serializes `model` into an artifact whose file names start with `stem`.
    fn save(&self, model: &Self::Model, stem: &str) -> Result<ModelArtifact>;

    /// Rebuilds a model from an artifact previously produced by `save`.
    fn load(&self, artifact: &ModelArtifact) -> Result<Self::Model>;
}
