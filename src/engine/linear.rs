use log::debug;
use ndarray::{linalg, prelude::*};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{
    Adam, ArtifactFile, ClassifierEngine, Distribution, EngineErr, ModelArtifact, ModelShape,
    Result, TrainingSet,
};
use crate::config::TrainingConfig;

const FORMAT: &str = "linear-softmax";
const FORMAT_VERSION: u32 = 1;
const TOPOLOGY_SUFFIX: &str = ".json";
const WEIGHTS_SUFFIX: &str = ".weights.bin";

/// Keeps `ln` finite for probabilities that underflowed to zero.
const MIN_PROB: f32 = 1e-7;

/// A trained softmax-regression model.
///
/// Parameters are stored flat: the `inputs x labels` weight matrix in row
/// major order, followed by one bias per label.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    labels: Vec<String>,
    inputs: usize,
    epochs: usize,
    params: Vec<f32>,
}

impl LinearModel {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// The number of epochs this model was fitted for.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Computes the label distribution for every row of `x`.
    fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        forward(&self.params, (self.inputs, self.labels.len()), x)
    }
}

/// Serialized companion of the weights file.
#[derive(Debug, Serialize, Deserialize)]
struct Topology {
    format: String,
    version: u32,
    labels: Vec<String>,
    inputs: usize,
    epochs: usize,
}

/// The built-in classifier engine: multinomial logistic regression fitted
/// with mini-batch Adam on the cross-entropy loss.
#[derive(Debug, Clone)]
pub struct LinearEngine {
    batch_size: usize,
    learning_rate: f32,
    seed: Option<u64>,
}

impl LinearEngine {
    /// Creates a new `LinearEngine`.
    ///
    /// # Arguments
    /// * `config` - Batch size, learning rate and optional shuffling seed.
    ///
    /// # Returns
    /// A new `LinearEngine` instance.
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            learning_rate: config.learning_rate,
            seed: config.seed,
        }
    }

    fn generate_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl ClassifierEngine for LinearEngine {
    type Model = LinearModel;

    fn train(
        &self,
        set: &TrainingSet,
        epochs: usize,
        cancel: &CancellationToken,
    ) -> Result<LinearModel> {
        let x = design_matrix(set)?;
        let (samples, inputs) = x.dim();
        let classes = set.labels.len();

        let mut params = vec![0.0; (inputs + 1) * classes];
        let mut grad = vec![0.0; params.len()];
        let mut adam = Adam::with_learning_rate(params.len(), self.learning_rate);
        let mut rng = self.generate_rng();
        let mut order: Vec<usize> = (0..samples).collect();

        for epoch in 0..epochs {
            if cancel.is_cancelled() {
                return Err(EngineErr::Cancelled);
            }

            order.shuffle(&mut rng);
            let mut total_loss = 0.0;
            let mut num_batches = 0;

            for batch in order.chunks(self.batch_size) {
                let xb = x.select(Axis(0), batch);
                let mut delta = forward(&params, (inputs, classes), xb.view())?;

                let mut loss = 0.0;
                for (row, &i) in batch.iter().enumerate() {
                    let target = set.targets[i];
                    loss -= delta[[row, target]].max(MIN_PROB).ln();
                    delta[[row, target]] -= 1.0;
                }

                let m = batch.len() as f32;
                total_loss += loss / m;
                num_batches += 1;
                delta /= m;

                {
                    let (mut dw, mut db) = split_grad(&mut grad, (inputs, classes))?;
                    linalg::general_mat_mul(1.0, &xb.t(), &delta, 0.0, &mut dw);
                    db.assign(&delta.sum_axis(Axis(0)));
                }

                adam.update_params(&grad, &mut params)?;
            }

            debug!("epoch {epoch}: loss={:.4}", total_loss / num_batches as f32);
        }

        Ok(LinearModel {
            labels: set.labels.clone(),
            inputs,
            epochs,
            params,
        })
    }

    fn infer(&self, model: &LinearModel, features: &[f32]) -> Result<Distribution> {
        if features.len() != model.inputs {
            return Err(EngineErr::ShapeMismatch {
                what: "features",
                got: features.len(),
                expected: model.inputs,
            });
        }

        let x = ArrayView2::from_shape((1, model.inputs), features).map_err(|_| {
            EngineErr::ShapeMismatch {
                what: "features",
                got: features.len(),
                expected: model.inputs,
            }
        })?;

        let probs = model.forward(x)?;
        Ok(Distribution::new(probs.row(0).to_vec()))
    }

    fn shape(&self, model: &LinearModel) -> ModelShape {
        ModelShape {
            inputs: model.inputs,
            labels: model.labels.clone(),
        }
    }

    fn save(&self, model: &LinearModel, stem: &str) -> Result<ModelArtifact> {
        let topology = Topology {
            format: FORMAT.to_string(),
            version: FORMAT_VERSION,
            labels: model.labels.clone(),
            inputs: model.inputs,
            epochs: model.epochs,
        };

        let weights = model.params.iter().flat_map(|p| p.to_le_bytes()).collect();

        Ok(ModelArtifact {
            files: vec![
                ArtifactFile {
                    name: format!("{stem}{TOPOLOGY_SUFFIX}"),
                    bytes: serde_json::to_vec_pretty(&topology)?,
                },
                ArtifactFile {
                    name: format!("{stem}{WEIGHTS_SUFFIX}"),
                    bytes: weights,
                },
            ],
        })
    }

    fn load(&self, artifact: &ModelArtifact) -> Result<LinearModel> {
        let weights = artifact
            .find(WEIGHTS_SUFFIX)
            .ok_or(EngineErr::MissingFile("weights"))?;

        let topology = artifact
            .find(TOPOLOGY_SUFFIX)
            .ok_or(EngineErr::MissingFile("topology"))?;

        let topology: Topology = serde_json::from_slice(&topology.bytes)?;

        if topology.format != FORMAT || topology.version != FORMAT_VERSION {
            return Err(EngineErr::InvalidInput(format!(
                "unsupported model format {} v{}",
                topology.format, topology.version
            )));
        }

        if weights.bytes.len() % 4 != 0 {
            return Err(EngineErr::InvalidInput(format!(
                "weights file length {} is not a multiple of 4",
                weights.bytes.len()
            )));
        }

        let params: Vec<f32> = weights
            .bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let expected = topology
            .inputs
            .checked_add(1)
            .and_then(|n| n.checked_mul(topology.labels.len()))
            .ok_or_else(|| {
                EngineErr::InvalidInput(format!(
                    "model with {} inputs and {} labels is too large",
                    topology.inputs,
                    topology.labels.len()
                ))
            })?;
        if params.len() != expected {
            return Err(EngineErr::ShapeMismatch {
                what: "weights",
                got: params.len(),
                expected,
            });
        }

        Ok(LinearModel {
            labels: topology.labels,
            inputs: topology.inputs,
            epochs: topology.epochs,
            params,
        })
    }
}

/// Validates `set` and stacks its features into a `samples x inputs` matrix.
fn design_matrix(set: &TrainingSet) -> Result<Array2<f32>> {
    if set.is_empty() {
        return Err(EngineErr::InvalidInput("the training set is empty".into()));
    }

    if set.labels.is_empty() {
        return Err(EngineErr::InvalidInput("the training set has no labels".into()));
    }

    if set.targets.len() != set.features.len() {
        return Err(EngineErr::ShapeMismatch {
            what: "targets",
            got: set.targets.len(),
            expected: set.features.len(),
        });
    }

    if let Some(&target) = set.targets.iter().find(|&&t| t >= set.labels.len()) {
        return Err(EngineErr::InvalidInput(format!(
            "target {target} is out of range for {} labels",
            set.labels.len()
        )));
    }

    let inputs = set.features[0].len();
    if let Some(row) = set.features.iter().find(|row| row.len() != inputs) {
        return Err(EngineErr::ShapeMismatch {
            what: "features",
            got: row.len(),
            expected: inputs,
        });
    }

    let flat: Vec<f32> = set.features.iter().flatten().copied().collect();
    Array2::from_shape_vec((set.len(), inputs), flat).map_err(|_| EngineErr::ShapeMismatch {
        what: "features",
        got: set.len() * inputs,
        expected: set.len() * inputs,
    })
}

/// Softmax of `x · w + b` for every row of `x`.
fn forward(params: &[f32], dim: (usize, usize), x: ArrayView2<f32>) -> Result<Array2<f32>> {
    let (w, b) = view_params(params, dim)?;

    let mut z = x.dot(&w);
    z += &b;

    for mut row in z.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }

    Ok(z)
}

/// Gives a view of the raw parameter slice as the weights and biases.
fn view_params(
    params: &[f32],
    dim: (usize, usize),
) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
    let w_size = dim.0 * dim.1;
    let mismatch = || EngineErr::ShapeMismatch {
        what: "params",
        got: params.len(),
        expected: w_size + dim.1,
    };

    if params.len() != w_size + dim.1 {
        return Err(mismatch());
    }

    let weights = ArrayView2::from_shape(dim, &params[..w_size]).map_err(|_| mismatch())?;
    let biases = ArrayView1::from_shape(dim.1, &params[w_size..]).map_err(|_| mismatch())?;
    Ok((weights, biases))
}

/// Gives a view of the raw gradient slice as the delta weights and delta biases.
fn split_grad(
    grad: &mut [f32],
    dim: (usize, usize),
) -> Result<(ArrayViewMut2<'_, f32>, ArrayViewMut1<'_, f32>)> {
    let w_size = dim.0 * dim.1;
    let len = grad.len();
    let mismatch = || EngineErr::ShapeMismatch {
        what: "gradient",
        got: len,
        expected: w_size + dim.1,
    };

    if len != w_size + dim.1 {
        return Err(mismatch());
    }

    let (dw_raw, db_raw) = grad.split_at_mut(w_size);
    let dw = ArrayViewMut2::from_shape(dim, dw_raw).map_err(|_| mismatch())?;
    let db = ArrayViewMut1::from_shape(dim.1, db_raw).map_err(|_| mismatch())?;
    Ok((dw, db))
}
