use log::debug;

use crate::{
    engine::TrainingSet,
    error::{RejectReason, Result},
    labels::LabelSet,
    landmarks::{FEATURE_WIDTH, FeatureVector},
};

/// Recorded samples, one ordered sequence of feature vectors per label.
///
/// Every stored vector is `FEATURE_WIDTH` long. There is no cap per label,
/// no deduplication and no balancing.
#[derive(Debug, Clone)]
pub struct SampleStore {
    labels: LabelSet,
    samples: Vec<Vec<FeatureVector>>,
}

impl SampleStore {
    /// Creates an empty `SampleStore`.
    ///
    /// # Arguments
    /// * `labels` - The labels samples can be recorded under.
    ///
    /// # Returns
    /// A new `SampleStore` instance.
    pub fn new(labels: LabelSet) -> Self {
        let samples = vec![Vec::new(); labels.len()];
        Self { labels, samples }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Appends `features` to the sequence of `label`.
    ///
    /// # Errors
    /// Returns `GestureErr::RecordRejected` and leaves the store untouched if
    /// `label` isn't configured or `features` isn't `FEATURE_WIDTH` long.
    pub fn record(&mut self, label: &str, features: FeatureVector) -> Result<()> {
        let index = self
            .labels
            .index_of(label)
            .ok_or_else(|| RejectReason::UnknownLabel(label.to_string()))?;

        if features.len() != FEATURE_WIDTH {
            return Err(RejectReason::FeatureWidth {
                got: features.len(),
                expected: FEATURE_WIDTH,
            }
            .into());
        }

        self.samples[index].push(features);
        debug!("recorded sample for {label}: {} stored", self.samples[index].len());
        Ok(())
    }

    /// Returns the total number of stored vectors across all labels.
    pub fn count_all(&self) -> usize {
        self.samples.iter().map(Vec::len).sum()
    }

    /// Returns the number of vectors stored for `label`.
    pub fn count(&self, label: &str) -> Option<usize> {
        let index = self.labels.index_of(label)?;
        Some(self.samples[index].len())
    }

    /// Returns every label with its sample count, in enumeration order.
    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.labels
            .iter()
            .zip(&self.samples)
            .map(|(label, samples)| (label, samples.len()))
            .collect()
    }

    /// Builds a training set out of every stored vector, grouped by label in
    /// enumeration order. The store keeps its samples.
    pub fn drain(&self) -> TrainingSet {
        let total = self.count_all();
        let mut features = Vec::with_capacity(total);
        let mut targets = Vec::with_capacity(total);

        for (index, samples) in self.samples.iter().enumerate() {
            features.extend(samples.iter().cloned());
            targets.extend(std::iter::repeat(index).take(samples.len()));
        }

        TrainingSet {
            labels: self.labels.names().to_vec(),
            features,
            targets,
        }
    }

    /// Drops every recorded sample.
    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(Vec::clear);
    }

    /// Lists the labels that lag behind the best represented one.
    ///
    /// # Arguments
    /// * `ratio` - A label lags when it has fewer than `max_count / ratio` samples.
    ///
    /// # Returns
    /// The lagging labels in enumeration order, empty if the store is empty.
    pub fn imbalance(&self, ratio: f32) -> Vec<&str> {
        let max = self.samples.iter().map(Vec::len).max().unwrap_or(0);
        if max == 0 {
            return Vec::new();
        }

        let floor = max as f32 / ratio;
        self.counts()
            .into_iter()
            .filter(|&(_, count)| count == 0 || (count as f32) < floor)
            .map(|(label, _)| label)
            .collect()
    }
}
