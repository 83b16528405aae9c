//! Hand landmark frames and the feature vectors derived from them.

/// Keypoints reported per detected hand.
pub const LANDMARK_COUNT: usize = 21;

/// Scalars per feature vector: every keypoint contributes `x, y, z`.
pub const FEATURE_WIDTH: usize = LANDMARK_COUNT * 3;

/// Keypoint indices, following the hand-landmark model convention.
pub mod joints {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    /// Joints per finger, from the knuckle out to the tip.
    pub const PER_FINGER: usize = 4;

    /// First joint index of `finger` (0 = thumb, 4 = pinky).
    pub const fn finger_base(finger: usize) -> usize {
        1 + finger * PER_FINGER
    }
}

/// A flattened hand pose, the unit stored in the sample store and fed to the
/// classifier.
pub type FeatureVector = Vec<f32>;

/// A single keypoint. `x` and `y` are normalized to the frame dimensions,
/// `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The keypoints of one detected hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: [Landmark; LANDMARK_COUNT],
}

impl LandmarkFrame {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Builds a frame from a slice of keypoints.
    ///
    /// # Returns
    /// `None` unless `points` holds exactly `LANDMARK_COUNT` keypoints.
    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let points = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Flattens the frame into its feature vector, point by point as `x, y, z`.
    pub fn features(&self) -> FeatureVector {
        self.points.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
    }
}
