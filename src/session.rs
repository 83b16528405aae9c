use std::path::PathBuf;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    capture::{Frame, FrameSource},
    config::SessionConfig,
    detector::LandmarkDetector,
    engine::ClassifierEngine,
    error::{GestureErr, RejectReason, Result},
    landmarks::LandmarkFrame,
    manager::{ModelManager, Phase, Prediction},
    overlay::{OverlayRenderer, Surface},
    store::SampleStore,
};

/// An operator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleSidebar,
    /// Stores the latest landmark frame under the given label.
    RecordSample(String),
    ClearSamples,
    TriggerTraining,
    CancelTraining,
    ToggleDetection,
    /// Writes the active model into the given directory.
    ExportModel(PathBuf),
    /// Loads a model from the given artifact files.
    ImportModel(Vec<PathBuf>),
}

/// What the session reports back to the display.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Status(String),
    Prediction(Prediction),
    DetectionToggled(bool),
    SidebarToggled(bool),
    TrainingStarted { samples: usize },
    TrainingFinished { ok: bool },
}

/// A recognition session: owns the samples, the model lifecycle, the
/// detector and the overlay, and turns frames and commands into events.
pub struct Session<E: ClassifierEngine, D: LandmarkDetector> {
    config: SessionConfig,
    store: SampleStore,
    manager: ModelManager<E>,
    detector: D,
    renderer: OverlayRenderer,
    latest: Option<LandmarkFrame>,
    sidebar_open: bool,
    status: String,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<E: ClassifierEngine, D: LandmarkDetector> Session<E, D> {
    /// Creates a new `Session` with an empty sample store and no model.
    ///
    /// # Arguments
    /// * `config` - The session settings, validated here.
    /// * `engine` - The classifier engine.
    /// * `detector` - The landmark detector, configured here.
    ///
    /// # Returns
    /// The session and the receiving end of its event channel.
    ///
    /// # Errors
    /// `Config` if `config` is invalid.
    pub fn new(
        config: SessionConfig,
        engine: E,
        mut detector: D,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        config.validate()?;

        let renderer = OverlayRenderer::from_config(&config.overlay)?;
        detector.configure(&config.detector);

        let labels = config.label_set();
        let store = SampleStore::new(labels.clone());
        let manager = ModelManager::new(engine, labels, config.min_samples, config.training.epochs);
        let (tx, rx) = mpsc::unbounded_channel();

        let session = Self {
            config,
            store,
            manager,
            detector,
            renderer,
            latest: None,
            sidebar_open: true,
            status: String::new(),
            events: tx,
        };

        Ok((session, rx))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn manager(&self) -> &ModelManager<E> {
        &self.manager
    }

    pub fn phase(&self) -> Phase {
        self.manager.phase()
    }

    /// The landmarks seen on the last tick, if a hand was in view.
    pub fn latest(&self) -> Option<&LandmarkFrame> {
        self.latest.as_ref()
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    /// The last status message.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Processes one frame. Non-blocking.
    ///
    /// Applies a finished training, detects landmarks, redraws the overlay
    /// and, in detecting mode, classifies the landmarks.
    ///
    /// # Returns
    /// The prediction made on this frame, if any.
    pub fn tick<S: Surface + ?Sized>(&mut self, frame: &Frame, surface: &mut S) -> Option<Prediction> {
        if let Some(outcome) = self.manager.poll_training() {
            let _ = self.training_finished(outcome);
        }

        self.renderer
            .fit(surface, frame.width as usize, frame.height as usize);
        self.latest = self.detector.detect(frame);
        self.renderer.render(surface, self.latest.as_ref());

        match self.manager.infer(self.latest.as_ref()) {
            Ok(Some(prediction)) => {
                self.emit(SessionEvent::Prediction(prediction.clone()));
                Some(prediction)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("frame {}: {e}", frame.sequence);
                self.set_status(e.to_string());
                None
            }
        }
    }

    /// Runs `command` to completion.
    ///
    /// # Errors
    /// Whatever the command was rejected with; the message also becomes the
    /// status and nothing else changes.
    pub async fn dispatch(&mut self, command: Command) -> Result<()> {
        debug!("dispatching {command:?}");

        let result = self.apply(command).await;
        if let Err(e) = &result {
            info!("command rejected: {e}");
            self.set_status(e.to_string());
        }

        result
    }

    async fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::ToggleSidebar => {
                self.sidebar_open = !self.sidebar_open;
                self.emit(SessionEvent::SidebarToggled(self.sidebar_open));
            }

            Command::RecordSample(label) => self.record(&label)?,

            Command::ClearSamples => {
                if self.manager.is_training() {
                    return Err(GestureErr::TrainingInProgress);
                }
                self.store.clear();
                self.set_status("Samples cleared".into());
            }

            Command::TriggerTraining => self.train()?,

            Command::CancelTraining => {
                if self.manager.cancel_training() {
                    self.set_status("Cancelling training".into());
                }
            }

            Command::ToggleDetection => {
                let detecting = self.manager.toggle_detection()?;
                self.emit(SessionEvent::DetectionToggled(detecting));
                let status = if detecting {
                    "Detecting"
                } else {
                    "Detection stopped"
                };
                self.set_status(status.into());
            }

            Command::ExportModel(dir) => {
                self.manager.export(&dir, &self.config.export_name).await?;
                self.set_status("Model saved".into());
            }

            Command::ImportModel(files) => {
                self.manager.import(&files).await?;
                self.set_status("Model loaded".into());
            }
        }

        Ok(())
    }

    fn record(&mut self, label: &str) -> Result<()> {
        if self.manager.is_training() {
            return Err(RejectReason::TrainingInProgress.into());
        }

        let features = self
            .latest
            .as_ref()
            .ok_or(RejectReason::NoHand)?
            .features();
        self.store.record(label, features)?;

        let count = self.store.count(label).unwrap_or_default();
        self.set_status(format!("Recorded {label} ({count})"));
        Ok(())
    }

    fn train(&mut self) -> Result<()> {
        let lagging = self.store.imbalance(self.config.imbalance_ratio);
        let note = if lagging.is_empty() {
            String::new()
        } else {
            warn!("few samples for {}", lagging.join(", "));
            format!("; few samples for {}", lagging.join(", "))
        };

        let samples = self.manager.start_training(&self.store)?;
        self.emit(SessionEvent::TrainingStarted { samples });
        self.set_status(format!("Training on {samples} samples{note}"));
        Ok(())
    }

    /// Waits for a running training to finish and applies its outcome.
    ///
    /// # Returns
    /// `None` if no training was running, otherwise its outcome.
    pub async fn finish_training(&mut self) -> Option<Result<()>> {
        let outcome = self.manager.finish_training().await?;
        Some(self.training_finished(outcome))
    }

    fn training_finished(&mut self, outcome: Result<()>) -> Result<()> {
        self.emit(SessionEvent::TrainingFinished {
            ok: outcome.is_ok(),
        });

        match &outcome {
            Ok(()) => self.set_status("Training complete".into()),
            Err(e) => self.set_status(e.to_string()),
        }

        outcome
    }

    /// Drives the session until `source` runs dry or `shutdown` fires.
    ///
    /// Pending commands are drained before every frame; a rejected command
    /// is reported through the status and does not stop the loop.
    ///
    /// # Returns
    /// The number of frames processed.
    ///
    /// # Errors
    /// `Io` if `source` fails to start.
    pub async fn run<F, S>(
        &mut self,
        source: &mut F,
        surface: &mut S,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) -> Result<u64>
    where
        F: FrameSource + ?Sized,
        S: Surface + ?Sized,
    {
        source.start()?;
        info!("session started");

        let mut frames = 0;
        while !shutdown.is_cancelled() {
            while let Ok(command) = commands.try_recv() {
                let _ = self.dispatch(command).await;
            }

            let Some(frame) = source.next_frame() else {
                break;
            };

            self.tick(&frame, surface);
            frames += 1;
            tokio::task::yield_now().await;
        }

        info!("session stopped after {frames} frames");
        Ok(frames)
    }

    fn set_status(&mut self, status: String) {
        debug!("status: {status}");
        self.status.clone_from(&status);
        self.emit(SessionEvent::Status(status));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
