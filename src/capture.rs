use std::io;

/// One captured video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Monotonic position of the frame in its stream.
    pub sequence: u64,
    /// Raw pixel data, opaque to everything but the landmark detector.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, sequence: u64) -> Self {
        Self {
            width,
            height,
            sequence,
            data: Vec::new(),
        }
    }
}

/// A continuous sequence of frames, such as a camera feed.
pub trait FrameSource: Send {
    /// Opens the stream. Frames are only delivered after this succeeds.
    fn start(&mut self) -> io::Result<()>;

    /// Returns the next frame, or `None` once the stream ended.
    fn next_frame(&mut self) -> Option<Frame>;
}
