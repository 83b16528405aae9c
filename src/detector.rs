use crate::{capture::Frame, config::DetectorOptions, landmarks::LandmarkFrame};

/// Hand-tracking provider: finds at most one hand's keypoints in a frame.
pub trait LandmarkDetector: Send {
    /// Applies tracking options before the first `detect` call.
    fn configure(&mut self, options: &DetectorOptions);

    /// Returns the 21 keypoints of the hand in `frame`, or `None` if no hand
    /// was found.
    fn detect(&mut self, frame: &Frame) -> Option<LandmarkFrame>;
}
