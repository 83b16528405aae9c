//! Simulation mode: an in-memory frame source and a scripted landmark detector
//! that stand in for a camera and a hand-tracking provider.

use std::io;

use rand::Rng;

use crate::{
    capture::{Frame, FrameSource},
    config::{CameraConfig, DetectorOptions},
    detector::LandmarkDetector,
    landmarks::{LANDMARK_COUNT, Landmark, LandmarkFrame, joints},
};

/// Produces blank frames at a fixed resolution.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    width: u32,
    height: u32,
    limit: Option<u64>,
    next: u64,
    started: bool,
}

impl ScriptedSource {
    /// Creates a new `ScriptedSource`.
    ///
    /// # Arguments
    /// * `camera` - The resolution of the produced frames.
    /// * `limit` - How many frames to produce before ending, `None` for endless.
    ///
    /// # Returns
    /// A new `ScriptedSource` instance.
    pub fn new(camera: &CameraConfig, limit: Option<u64>) -> Self {
        Self {
            width: camera.width,
            height: camera.height,
            limit,
            next: 0,
            started: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn start(&mut self) -> io::Result<()> {
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.started || self.limit.is_some_and(|limit| self.next >= limit) {
            return None;
        }

        let frame = Frame::new(self.width, self.height, self.next);
        self.next += 1;
        Some(frame)
    }
}

/// Replays a fixed script of detections, indexed by frame sequence.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: Vec<Option<LandmarkFrame>>,
    options: Option<DetectorOptions>,
}

impl ScriptedDetector {
    /// Creates a detector that reports `script[sequence % script.len()]` for
    /// each frame; an empty script never finds a hand.
    pub fn new(script: Vec<Option<LandmarkFrame>>) -> Self {
        Self {
            script,
            options: None,
        }
    }

    /// Creates a detector that reports the same hand on every frame.
    pub fn repeating(pose: LandmarkFrame) -> Self {
        Self::new(vec![Some(pose)])
    }

    /// The options passed to the last `configure` call.
    pub fn options(&self) -> Option<&DetectorOptions> {
        self.options.as_ref()
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn configure(&mut self, options: &DetectorOptions) {
        self.options = Some(*options);
    }

    fn detect(&mut self, frame: &Frame) -> Option<LandmarkFrame> {
        if self.script.is_empty() {
            return None;
        }

        let index = (frame.sequence % self.script.len() as u64) as usize;
        self.script[index].clone()
    }
}

const WRIST: (f32, f32) = (0.5, 0.85);
const KNUCKLE_Y: f32 = 0.65;
const EXTENDED_STEP: f32 = 0.08;
const CURLED_STEP: f32 = 0.015;

/// Builds a hand pose where only finger `class % 5` is extended (0 = thumb,
/// 4 = pinky), with every coordinate shifted by up to `jitter`.
pub fn synthetic_pose<R: Rng + ?Sized>(class: usize, jitter: f32, rng: &mut R) -> LandmarkFrame {
    let jitter = jitter.abs();
    let extended = class % 5;
    let mut points = [Landmark::default(); LANDMARK_COUNT];

    points[joints::WRIST] = Landmark::new(WRIST.0, WRIST.1, 0.0);

    for finger in 0..5 {
        let x = 0.38 + finger as f32 * 0.06;
        let step = if finger == extended {
            EXTENDED_STEP
        } else {
            CURLED_STEP
        };

        for joint in 0..joints::PER_FINGER {
            let y = KNUCKLE_Y - step * joint as f32;
            let z = if finger == extended {
                0.0
            } else {
                -0.02 * joint as f32
            };
            points[joints::finger_base(finger) + joint] = Landmark::new(x, y, z);
        }
    }

    if jitter > 0.0 {
        for point in &mut points {
            point.x += rng.random_range(-jitter..=jitter);
            point.y += rng.random_range(-jitter..=jitter);
            point.z += rng.random_range(-jitter..=jitter);
        }
    }

    LandmarkFrame::new(points)
}
