use std::{collections::HashSet, error::Error, fmt, fs, io, path::Path};

use serde::Deserialize;

use crate::labels::{DEFAULT_LABELS, LabelSet};

/// Configuration failures, caught before a session starts.
#[derive(Debug)]
pub enum ConfigErr {
    /// The config file could not be read.
    Io { path: String, source: io::Error },
    /// The config file is not valid JSON for a `SessionConfig`.
    Parse(serde_json::Error),
    /// A value is out of its allowed range.
    Invalid(String),
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read '{path}': {source}"),
            Self::Parse(e) => write!(f, "invalid config: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

/// Options handed to the landmark detector.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_hands: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_hands: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.6,
        }
    }
}

/// Target resolution requested from the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Landmark marker appearance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub marker_radius: f32,
    /// `#rrggbb`.
    pub color: String,
}

impl OverlayConfig {
    /// Parses `color` into a `0xFFRRGGBB` pixel.
    ///
    /// # Errors
    /// Returns `ConfigErr::Invalid` if `color` isn't a `#rrggbb` string.
    pub fn color_pixel(&self) -> Result<u32, ConfigErr> {
        let invalid = || ConfigErr::Invalid(format!("overlay color '{}' is not #rrggbb", self.color));

        let hex = self.color.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 {
            return Err(invalid());
        }

        let rgb = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        Ok(0xFF00_0000 | rgb)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            marker_radius: 4.0,
            color: "#00ff00".into(),
        }
    }
}

/// Training hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Fixed shuffling seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 32,
            learning_rate: 0.01,
            seed: None,
        }
    }
}

/// Everything a recognition session needs to know up front.
///
/// Every field has a default, so a config file only has to name what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub labels: Vec<String>,
    /// Minimum number of recorded samples before training is allowed.
    pub min_samples: usize,
    /// Labels with fewer than `max_count / imbalance_ratio` samples are
    /// reported before training.
    pub imbalance_ratio: f32,
    /// File name stem for exported models.
    pub export_name: String,
    pub training: TrainingConfig,
    pub detector: DetectorOptions,
    pub camera: CameraConfig,
    pub overlay: OverlayConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            min_samples: 50,
            imbalance_ratio: 3.0,
            export_name: "gesture-model".into(),
            training: TrainingConfig::default(),
            detector: DetectorOptions::default(),
            camera: CameraConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Loads a `SessionConfig` from a JSON file and validates it.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON file.
    ///
    /// # Errors
    /// Returns `ConfigErr` if the file can't be read, parsed or validated.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigErr> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigErr::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json_str(&content)
    }

    /// Parses and validates a `SessionConfig` from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigErr> {
        let config: Self = serde_json::from_str(content).map_err(ConfigErr::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured labels as a `LabelSet`.
    pub fn label_set(&self) -> LabelSet {
        LabelSet::new(self.labels.iter().cloned())
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    /// Returns `ConfigErr::Invalid` describing the first offending value.
    pub fn validate(&self) -> Result<(), ConfigErr> {
        let invalid = |msg: String| Err(ConfigErr::Invalid(msg));

        if self.labels.is_empty() {
            return invalid("at least one label is required".into());
        }

        let mut unique = HashSet::with_capacity(self.labels.len());
        for label in &self.labels {
            if label.trim().is_empty() {
                return invalid("labels must not be blank".into());
            }
            if !unique.insert(label.as_str()) {
                return invalid(format!("label '{label}' is repeated"));
            }
        }

        if self.min_samples == 0 {
            return invalid("min_samples must be greater than 0".into());
        }

        if !(self.imbalance_ratio >= 1.0) {
            return invalid(format!(
                "imbalance_ratio ({}) must be at least 1",
                self.imbalance_ratio
            ));
        }

        if self.export_name.trim().is_empty() || self.export_name.contains(['/', '\\']) {
            return invalid(format!("export_name '{}' is not a file stem", self.export_name));
        }

        let training = &self.training;
        if training.epochs == 0 {
            return invalid("training.epochs must be greater than 0".into());
        }
        if training.batch_size == 0 {
            return invalid("training.batch_size must be greater than 0".into());
        }
        if !(training.learning_rate.is_finite() && training.learning_rate > 0.0) {
            return invalid(format!(
                "training.learning_rate ({}) must be positive",
                training.learning_rate
            ));
        }

        let detector = &self.detector;
        if detector.max_hands == 0 {
            return invalid("detector.max_hands must be greater than 0".into());
        }
        for (name, value) in [
            ("min_detection_confidence", detector.min_detection_confidence),
            ("min_tracking_confidence", detector.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("detector.{name} ({value}) must be within [0, 1]"));
            }
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return invalid("camera dimensions must be greater than 0".into());
        }

        if !(self.overlay.marker_radius.is_finite() && self.overlay.marker_radius > 0.0) {
            return invalid(format!(
                "overlay.marker_radius ({}) must be positive",
                self.overlay.marker_radius
            ));
        }
        self.overlay.color_pixel()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();

        config.validate().unwrap();
        assert_eq!(config.min_samples, 50);
        assert_eq!(config.training.epochs, 30);
        assert_eq!(config.label_set().len(), 5);
        assert_eq!(config.overlay.color_pixel().unwrap(), 0xFF00FF00);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = SessionConfig::from_json_str(
            r#"{ "labels": ["A", "B"], "min_samples": 4, "training": { "epochs": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.labels, ["A", "B"]);
        assert_eq!(config.min_samples, 4);
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.detector, DetectorOptions::default());
    }

    #[test]
    fn repeated_labels_are_rejected() {
        let err = SessionConfig::from_json_str(r#"{ "labels": ["A", "A"] }"#).unwrap_err();
        assert!(matches!(err, ConfigErr::Invalid(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for json in [
            r#"{ "min_samples": 0 }"#,
            r#"{ "training": { "learning_rate": 0.0 } }"#,
            r#"{ "detector": { "min_detection_confidence": 1.5 } }"#,
            r#"{ "overlay": { "color": "green" } }"#,
            r#"{ "export_name": "../model" }"#,
        ] {
            let err = SessionConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, ConfigErr::Invalid(_)), "{json}");
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SessionConfig::from_json_str("{ labels: ").unwrap_err();
        assert!(matches!(err, ConfigErr::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SessionConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigErr::Io { .. }));
    }
}
