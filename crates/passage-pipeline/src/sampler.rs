//! Frame sampling — tick counting, processing stride and detection
//! downscaling.
//!
//! Only every Nth tick is detection-eligible; skipped ticks still carry
//! the full-resolution frame so the presentation layer can keep rendering
//! the previous boxes instead of flickering to empty.

use crate::frame::{CaptureError, Frame};
use image::RgbImage;

/// Source of camera frames. A read failure means the source is gone and
/// is propagated, not retried.
pub trait FrameSource {
    fn read(&mut self) -> Result<Frame, CaptureError>;
}

/// One sampled unit of work for the pipeline.
pub enum Sampled {
    /// Detection-eligible tick: full frame plus a downscaled copy. All
    /// geometry produced on `detect` must be rescaled by `1.0 / scale`
    /// before being reported outward.
    Processed {
        frame: Frame,
        detect: RgbImage,
        scale: f32,
    },
    /// Off-stride tick: render-only.
    Skipped { frame: Frame },
}

pub struct FrameSampler<S> {
    source: S,
    stride: u64,
    scale: f32,
    tick: u64,
}

impl<S: FrameSource> FrameSampler<S> {
    /// `stride` of N processes every Nth tick (minimum 1); `scale` is the
    /// detection downscale factor in (0, 1].
    pub fn new(source: S, stride: u64, scale: f32) -> Self {
        Self {
            source,
            stride: stride.max(1),
            scale: scale.clamp(0.05, 1.0),
            tick: 0,
        }
    }

    /// Current tick count (monotonically increasing).
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn next_unit(&mut self) -> Result<Sampled, CaptureError> {
        let frame = self.source.read()?;
        let eligible = self.tick % self.stride == 0;
        self.tick += 1;

        if eligible {
            let detect = frame.downscaled(self.scale);
            Ok(Sampled::Processed {
                frame,
                detect,
                scale: self.scale,
            })
        } else {
            Ok(Sampled::Skipped { frame })
        }
    }
}
