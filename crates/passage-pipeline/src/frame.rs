//! Frame type and YUYV color conversion.

use image::RgbImage;
use thiserror::Error;

/// Losing the capture source is fatal to the loop.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture source lost: {0}")]
    SourceLost(String),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// View the frame as an [`RgbImage`]. Clones the pixel buffer.
    pub fn to_image(&self) -> RgbImage {
        debug_assert_eq!(
            self.data.len(),
            (self.width * self.height * 3) as usize,
            "frame buffer length does not match dimensions"
        );
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Produce a downscaled copy for detection, bounding per-tick cost.
    pub fn downscaled(&self, scale: f32) -> RgbImage {
        let w = ((self.width as f32 * scale) as u32).max(1);
        let h = ((self.height as f32 * scale) as u32).max(1);
        image::imageops::resize(
            &self.to_image(),
            w,
            h,
            image::imageops::FilterType::Triangle,
        )
    }
}

/// Convert packed YUYV (4:2:2) to interleaved RGB using BT.601 full-swing
/// coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; U and V are shared
/// by the pixel pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for &y in [quad[0], quad[2]].iter() {
            let y = y as f32;
            let r = y + 1.402 * v;
            let g = y - 0.344 * u - 0.714 * v;
            let b = y + 1.772 * u;
            rgb.push(r.round().clamp(0.0, 255.0) as u8);
            rgb.push(g.round().clamp(0.0, 255.0) as u8);
            rgb.push(b.round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}
