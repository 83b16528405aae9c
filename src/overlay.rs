use log::debug;

use crate::{
    config::{ConfigErr, OverlayConfig},
    landmarks::LandmarkFrame,
};

/// Fully transparent pixel, what a cleared overlay holds.
pub const TRANSPARENT: u32 = 0x0000_0000;

/// Something the overlay can be drawn on.
pub trait Surface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Changes the dimensions, discarding the contents.
    fn resize(&mut self, width: usize, height: usize);

    /// Sets every pixel to `TRANSPARENT`.
    fn clear(&mut self);

    /// Fills the disc centered on (`cx`, `cy`) with `color`; pixels outside
    /// the surface are skipped.
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: u32);
}

/// An in-memory `0xAARRGGBB` pixel buffer, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    buf: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            buf: vec![TRANSPARENT; width * height],
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.buf
    }

    /// Returns the pixel at (`x`, `y`), or `None` outside the buffer.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.buf[y * self.width + x])
    }

    /// Number of pixels that are not transparent.
    pub fn painted(&self) -> usize {
        self.buf.iter().filter(|&&p| p != TRANSPARENT).count()
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.buf[y * self.width + x] = color;
        }
    }
}

impl Surface for FrameBuffer {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.buf = vec![TRANSPARENT; width * height];
    }

    fn clear(&mut self) {
        self.buf.fill(TRANSPARENT);
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: u32) {
        if self.width == 0 || self.height == 0 || radius <= 0.0 {
            return;
        }

        let x0 = (cx - radius).floor().max(0.0) as usize;
        let y0 = (cy - radius).floor().max(0.0) as usize;
        let x1 = (cx + radius).ceil().min((self.width - 1) as f32);
        let y1 = (cy + radius).ceil().min((self.height - 1) as f32);
        if x1 < 0.0 || y1 < 0.0 {
            return;
        }

        let r2 = radius * radius;
        for y in y0..=y1 as usize {
            for x in x0..=x1 as usize {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }
}

/// Draws one marker per landmark over the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRenderer {
    radius: f32,
    color: u32,
}

impl OverlayRenderer {
    pub fn new(radius: f32, color: u32) -> Self {
        Self { radius, color }
    }

    /// Builds a renderer out of the overlay settings.
    ///
    /// # Errors
    /// Returns `ConfigErr::Invalid` if the color isn't `#rrggbb`.
    pub fn from_config(config: &OverlayConfig) -> Result<Self, ConfigErr> {
        Ok(Self::new(config.marker_radius, config.color_pixel()?))
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    /// Matches `surface` to the frame dimensions if they differ.
    ///
    /// # Returns
    /// Whether the surface was resized.
    pub fn fit<S: Surface + ?Sized>(&self, surface: &mut S, width: usize, height: usize) -> bool {
        if surface.width() == width && surface.height() == height {
            return false;
        }

        debug!("overlay resized to {width}x{height}");
        surface.resize(width, height);
        true
    }

    /// Clears `surface` and draws a marker per point of `landmarks`, with the
    /// normalized coordinates scaled to the surface dimensions.
    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S, landmarks: Option<&LandmarkFrame>) {
        surface.clear();

        let Some(landmarks) = landmarks else {
            return;
        };

        let (w, h) = (surface.width() as f32, surface.height() as f32);
        for point in landmarks.points() {
            surface.fill_circle(point.x * w, point.y * h, self.radius, self.color);
        }
    }
}
