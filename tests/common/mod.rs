#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use sign_gesture::{
    SessionConfig,
    engine::{
        ArtifactFile, ClassifierEngine, Distribution, EngineErr, ModelArtifact, ModelShape,
        Result, TrainingSet,
    },
    landmarks::{FEATURE_WIDTH, LandmarkFrame},
    sim::synthetic_pose,
};
use rand::{SeedableRng, rngs::StdRng};
use tokio_util::sync::CancellationToken;

/// Knobs and counters shared between a test and its `StubEngine`.
#[derive(Debug, Default)]
pub struct Probe {
    pub fail: AtomicBool,
    pub hold: AtomicBool,
    pub fail_infer: AtomicBool,
    pub trains: AtomicUsize,
    pub infers: AtomicUsize,
}

impl Probe {
    pub fn trains(&self) -> usize {
        self.trains.load(Ordering::SeqCst)
    }

    pub fn infers(&self) -> usize {
        self.infers.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn set_fail_infer(&self, fail: bool) {
        self.fail_infer.store(fail, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StubModel {
    pub labels: Vec<String>,
    pub inputs: usize,
    /// Which training produced this model, starting at 1.
    pub generation: usize,
}

/// Engine that always predicts the first label, with switches to fail
/// inference or to fail or stall training.
#[derive(Debug, Clone, Default)]
pub struct StubEngine {
    pub probe: Arc<Probe>,
}

impl StubEngine {
    pub fn new() -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

impl ClassifierEngine for StubEngine {
    type Model = StubModel;

    fn train(
        &self,
        set: &TrainingSet,
        _epochs: usize,
        cancel: &CancellationToken,
    ) -> Result<StubModel> {
        while self.probe.hold.load(Ordering::SeqCst) {
            if cancel.is_cancelled() {
                return Err(EngineErr::Cancelled);
            }
            thread::sleep(Duration::from_millis(1));
        }

        if cancel.is_cancelled() {
            return Err(EngineErr::Cancelled);
        }

        if self.probe.fail.load(Ordering::SeqCst) {
            return Err(EngineErr::InvalidInput("forced failure".into()));
        }

        let generation = self.probe.trains.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StubModel {
            labels: set.labels.clone(),
            inputs: FEATURE_WIDTH,
            generation,
        })
    }

    fn infer(&self, model: &StubModel, features: &[f32]) -> Result<Distribution> {
        self.probe.infers.fetch_add(1, Ordering::SeqCst);

        if self.probe.fail_infer.load(Ordering::SeqCst) {
            return Err(EngineErr::InvalidInput("forced inference failure".into()));
        }

        if features.len() != model.inputs {
            return Err(EngineErr::ShapeMismatch {
                what: "features",
                got: features.len(),
                expected: model.inputs,
            });
        }

        let mut probs = vec![0.0; model.labels.len()];
        probs[0] = 1.0;
        Ok(Distribution::new(probs))
    }

    fn shape(&self, model: &StubModel) -> ModelShape {
        ModelShape {
            inputs: model.inputs,
            labels: model.labels.clone(),
        }
    }

    fn save(&self, model: &StubModel, stem: &str) -> Result<ModelArtifact> {
        let body = format!("{}\n{}\n{}", model.generation, model.inputs, model.labels.join("\n"));
        Ok(ModelArtifact {
            files: vec![ArtifactFile {
                name: format!("{stem}.stub"),
                bytes: body.into_bytes(),
            }],
        })
    }

    fn load(&self, artifact: &ModelArtifact) -> Result<StubModel> {
        let file = artifact.find(".stub").ok_or(EngineErr::MissingFile(".stub"))?;
        let body = String::from_utf8(file.bytes.clone())
            .map_err(|e| EngineErr::InvalidInput(e.to_string()))?;

        let mut lines = body.lines();
        let mut number = || {
            lines
                .next()
                .and_then(|l| l.parse::<usize>().ok())
                .ok_or_else(|| EngineErr::InvalidInput("bad header".into()))
        };
        let generation = number()?;
        let inputs = number()?;

        Ok(StubModel {
            labels: lines.map(str::to_string).collect(),
            inputs,
            generation,
        })
    }
}

/// A config with a small sample threshold, fixed seed and short training.
pub fn config(min_samples: usize) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.min_samples = min_samples;
    config.training.epochs = 3;
    config.training.seed = Some(42);
    config
}

pub fn pose(class: usize) -> LandmarkFrame {
    synthetic_pose(class, 0.0, &mut StdRng::seed_from_u64(class as u64))
}
