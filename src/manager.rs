use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::FutureExt;
use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::{
    fs,
    runtime::Handle,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::{ArtifactFile, ClassifierEngine, EngineErr, ModelArtifact, ModelShape},
    error::{GestureErr, Result},
    labels::LabelSet,
    landmarks::{FEATURE_WIDTH, LandmarkFrame},
    store::SampleStore,
};

/// Where the manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No model and no training running.
    Idle,
    /// A training job is in flight.
    Training,
    /// A model is active and detection is off.
    Ready,
    /// A model is active and every landmark frame is classified.
    Detecting,
}

/// A classified landmark frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// The single active model.
///
/// Writers swap a whole new `Arc` in; readers clone the current `Arc` and
/// keep using it even if it is replaced meanwhile, so no reader ever sees a
/// partially built model.
pub struct ModelSlot<M> {
    current: RwLock<Option<Arc<M>>>,
}

impl<M> ModelSlot<M> {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Returns the active model, if any.
    pub fn current(&self) -> Option<Arc<M>> {
        self.current.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_none()
    }

    /// Makes `model` the active model.
    ///
    /// # Returns
    /// The model that was active before.
    fn replace(&self, model: M) -> Option<Arc<M>> {
        self.current.write().replace(Arc::new(model))
    }
}

struct TrainingJob<M> {
    handle: JoinHandle<std::result::Result<M, EngineErr>>,
    cancel: CancellationToken,
    samples: usize,
}

/// Owns the active model and drives training, detection, inference and
/// persistence around it.
pub struct ModelManager<E: ClassifierEngine> {
    engine: Arc<E>,
    labels: LabelSet,
    min_samples: usize,
    epochs: usize,
    slot: Arc<ModelSlot<E::Model>>,
    detecting: bool,
    job: Option<TrainingJob<E::Model>>,
}

impl<E: ClassifierEngine> ModelManager<E> {
    /// Creates a new `ModelManager` with no model.
    ///
    /// # Arguments
    /// * `engine` - The classifier engine used to train, infer and persist.
    /// * `labels` - The labels models must be trained on.
    /// * `min_samples` - The minimum number of recorded samples to start a training.
    /// * `epochs` - The number of epochs each training runs for.
    ///
    /// # Returns
    /// A new `ModelManager` instance.
    pub fn new(engine: E, labels: LabelSet, min_samples: usize, epochs: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            labels,
            min_samples,
            epochs,
            slot: Arc::new(ModelSlot::new()),
            detecting: false,
            job: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn phase(&self) -> Phase {
        if self.job.is_some() {
            Phase::Training
        } else if self.slot.is_empty() {
            Phase::Idle
        } else if self.detecting {
            Phase::Detecting
        } else {
            Phase::Ready
        }
    }

    pub fn is_training(&self) -> bool {
        self.job.is_some()
    }

    pub fn is_detecting(&self) -> bool {
        self.detecting
    }

    pub fn has_model(&self) -> bool {
        !self.slot.is_empty()
    }

    /// Returns the active model, if any.
    pub fn model(&self) -> Option<Arc<E::Model>> {
        self.slot.current()
    }

    /// Returns a shared handle to the active model slot.
    pub fn model_slot(&self) -> Arc<ModelSlot<E::Model>> {
        Arc::clone(&self.slot)
    }

    /// Starts training a new model on a snapshot of `store`.
    ///
    /// The job runs on Tokio's blocking pool; its outcome is applied by
    /// `poll_training` or `finish_training`. The current model stays active
    /// until then.
    ///
    /// # Returns
    /// The number of samples the job trains on.
    ///
    /// # Errors
    /// * `TrainingInProgress` if a job is already running.
    /// * `InsufficientSamples` if `store` holds fewer than `min_samples` samples.
    /// * `Training` if there's no Tokio runtime to run the job on.
    pub fn start_training(&mut self, store: &SampleStore) -> Result<usize> {
        if self.job.is_some() {
            return Err(GestureErr::TrainingInProgress);
        }

        let samples = store.count_all();
        if samples < self.min_samples {
            info!(
                "training rejected: {samples} samples of the required {}",
                self.min_samples
            );
            return Err(GestureErr::InsufficientSamples {
                got: samples,
                required: self.min_samples,
            });
        }

        let runtime = Handle::try_current()
            .map_err(|e| GestureErr::Training(EngineErr::Aborted(e.to_string())))?;

        let set = store.drain();
        let cancel = CancellationToken::new();
        let engine = Arc::clone(&self.engine);
        let epochs = self.epochs;
        let token = cancel.clone();

        let handle = runtime.spawn_blocking(move || engine.train(&set, epochs, &token));

        info!("training started on {samples} samples for {epochs} epochs");
        self.job = Some(TrainingJob {
            handle,
            cancel,
            samples,
        });

        Ok(samples)
    }

    /// Applies the outcome of the training job if it already finished.
    ///
    /// Never blocks; meant to be called once per frame tick.
    ///
    /// # Returns
    /// `None` while no job finished, otherwise the job's outcome.
    pub fn poll_training(&mut self) -> Option<Result<()>> {
        let mut job = self.job.take()?;

        match (&mut job.handle).now_or_never() {
            Some(joined) => Some(self.complete(job.samples, joined)),
            None => {
                self.job = Some(job);
                None
            }
        }
    }

    /// Waits for the training job to finish and applies its outcome.
    ///
    /// # Returns
    /// `None` if no job was running, otherwise the job's outcome.
    pub async fn finish_training(&mut self) -> Option<Result<()>> {
        let job = self.job.take()?;
        let joined = job.handle.await;
        Some(self.complete(job.samples, joined))
    }

    /// Asks the running training job to stop at its next epoch boundary.
    ///
    /// # Returns
    /// Whether a job was running.
    pub fn cancel_training(&self) -> bool {
        match &self.job {
            Some(job) => {
                info!("cancelling training");
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn complete(
        &mut self,
        samples: usize,
        joined: std::result::Result<std::result::Result<E::Model, EngineErr>, JoinError>,
    ) -> Result<()> {
        match joined {
            Ok(Ok(model)) => {
                self.slot.replace(model);
                info!("training complete on {samples} samples");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("training failed, keeping the previous model: {e}");
                Err(GestureErr::Training(e))
            }
            Err(e) => {
                warn!("training job died, keeping the previous model: {e}");
                Err(GestureErr::Training(EngineErr::Aborted(e.to_string())))
            }
        }
    }

    /// Flips detection mode on or off.
    ///
    /// # Returns
    /// Whether detection is on after the toggle.
    ///
    /// # Errors
    /// `NoModel` if there's no active model to detect with.
    pub fn toggle_detection(&mut self) -> Result<bool> {
        if !self.has_model() {
            return Err(GestureErr::NoModel);
        }

        self.detecting = !self.detecting;
        info!("detection {}", if self.detecting { "on" } else { "off" });
        Ok(self.detecting)
    }

    /// Classifies `frame` with the active model.
    ///
    /// Nothing is sent to the engine unless detection is on, a frame is
    /// present and a model is active.
    ///
    /// # Returns
    /// The prediction, or `None` if inference was skipped this tick.
    ///
    /// # Errors
    /// `Inference` if the engine fails; detection stays on.
    pub fn infer(&self, frame: Option<&LandmarkFrame>) -> Result<Option<Prediction>> {
        if !self.detecting {
            return Ok(None);
        }

        let (Some(frame), Some(model)) = (frame, self.slot.current()) else {
            return Ok(None);
        };

        let dist = self
            .engine
            .infer(&model, &frame.features())
            .map_err(GestureErr::Inference)?;

        let (index, confidence) = dist.best().ok_or_else(|| {
            GestureErr::Inference(EngineErr::InvalidInput("empty distribution".into()))
        })?;

        let label = self.labels.name(index).ok_or(GestureErr::Inference(
            EngineErr::ShapeMismatch {
                what: "distribution",
                got: dist.probs().len(),
                expected: self.labels.len(),
            },
        ))?;

        debug!("predicted {label} ({confidence:.3})");
        Ok(Some(Prediction {
            label: label.to_string(),
            confidence,
        }))
    }

    /// Makes `model` the active model after checking it fits this session.
    ///
    /// # Errors
    /// `ModelLoad` if the model's input width or labels differ from the
    /// session's; the previous model stays active.
    pub fn install(&mut self, model: E::Model) -> Result<()> {
        let ModelShape { inputs, labels } = self.engine.shape(&model);

        if inputs != FEATURE_WIDTH {
            return Err(GestureErr::ModelLoad(EngineErr::ShapeMismatch {
                what: "model inputs",
                got: inputs,
                expected: FEATURE_WIDTH,
            }));
        }

        if labels != self.labels.names() {
            return Err(GestureErr::ModelLoad(EngineErr::InvalidInput(format!(
                "model labels {labels:?} don't match {:?}",
                self.labels.names()
            ))));
        }

        self.slot.replace(model);
        Ok(())
    }

    /// Writes the active model into `dir`.
    ///
    /// # Arguments
    /// * `dir` - Destination directory, created if missing.
    /// * `stem` - File name stem for the artifact files.
    ///
    /// # Returns
    /// The paths of the written files.
    ///
    /// # Errors
    /// `NoModel` without an active model, `ModelSave` or `Io` on failure.
    pub async fn export(&self, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        let model = self.slot.current().ok_or(GestureErr::NoModel)?;
        let artifact = self
            .engine
            .save(&model, stem)
            .map_err(GestureErr::ModelSave)?;

        fs::create_dir_all(dir).await?;

        let mut paths = Vec::with_capacity(artifact.files.len());
        for file in artifact.files {
            let path = dir.join(&file.name);
            fs::write(&path, &file.bytes).await?;
            paths.push(path);
        }

        info!("model saved to {}", dir.display());
        Ok(paths)
    }

    /// Loads a model from artifact files and makes it the active model.
    /// The detecting flag is left as it is.
    ///
    /// # Arguments
    /// * `files` - The artifact files, as written by `export`.
    ///
    /// # Errors
    /// `Io` if a file can't be read, `ModelLoad` if the artifact is malformed
    /// or incompatible; the previous model stays active either way.
    pub async fn import(&mut self, files: &[PathBuf]) -> Result<()> {
        let mut artifact = ModelArtifact::default();

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = fs::read(path).await?;
            artifact.files.push(ArtifactFile { name, bytes });
        }

        let model = self.engine.load(&artifact).map_err(GestureErr::ModelLoad)?;
        self.install(model)?;

        info!("model loaded from {} file(s)", files.len());
        Ok(())
    }
}
