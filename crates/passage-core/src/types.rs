use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Dimension of a face encoding vector.
pub const ENCODING_DIM: usize = 128;

/// Opaque identity key, as issued by the enrollment backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Face encoding vector (128-dimensional), compared by Euclidean distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoding {
    pub values: Vec<f32>,
}

impl Encoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Compute Euclidean distance to another encoding.
    ///
    /// Mismatched lengths compare only the common prefix; the gallery
    /// builder rejects wrong-dimension vectors before they get here.
    pub fn distance(&self, other: &Encoding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Bounding box for a detected face, in the coordinate space of the frame
/// it was detected in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Rescale the box by a uniform factor. Detection runs on a downscaled
    /// frame; multiplying by the inverse scale maps back to source pixels.
    pub fn scaled(&self, factor: f32) -> BoundingBox {
        BoundingBox {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
            confidence: self.confidence,
        }
    }

    /// Crop this region out of an RGB frame, clamped to the frame bounds.
    /// Returns `None` when the clamped region is empty.
    pub fn crop_from(&self, frame: &RgbImage) -> Option<RgbImage> {
        let x0 = self.x.max(0.0) as u32;
        let y0 = self.y.max(0.0) as u32;
        if x0 >= frame.width() || y0 >= frame.height() {
            return None;
        }
        let w = (self.width.max(0.0) as u32).min(frame.width() - x0);
        let h = (self.height.max(0.0) as u32).min(frame.height() - y0);
        if w == 0 || h == 0 {
            return None;
        }
        Some(image::imageops::crop_imm(frame, x0, y0, w, h).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Encoding::new(vec![0.1, 0.2, 0.3]);
        let b = Encoding::new(vec![0.1, 0.2, 0.3]);
        assert!(a.distance(&b).abs() < 1e-6);
    }

    #[test]
    fn test_distance_known_geometry() {
        // 3-4-5 triangle
        let a = Encoding::new(vec![0.0, 0.0]);
        let b = Encoding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Encoding::new(vec![1.0, -2.0, 0.5]);
        let b = Encoding::new(vec![-0.5, 1.0, 2.0]);
        assert!((a.distance(&b) - b.distance(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_scaled() {
        let bb = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            confidence: 0.9,
        };
        let up = bb.scaled(4.0);
        assert_eq!(up.x, 40.0);
        assert_eq!(up.y, 80.0);
        assert_eq!(up.width, 120.0);
        assert_eq!(up.height, 160.0);
        assert_eq!(up.confidence, 0.9);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = RgbImage::new(100, 80);
        let bb = BoundingBox {
            x: 90.0,
            y: 70.0,
            width: 50.0,
            height: 50.0,
            confidence: 1.0,
        };
        let crop = bb.crop_from(&frame).unwrap();
        assert_eq!(crop.width(), 10);
        assert_eq!(crop.height(), 10);
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let frame = RgbImage::new(100, 80);
        let bb = BoundingBox {
            x: 200.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
            confidence: 1.0,
        };
        assert!(bb.crop_from(&frame).is_none());
    }

    #[test]
    fn test_crop_negative_origin_clamped() {
        let frame = RgbImage::new(100, 80);
        let bb = BoundingBox {
            x: -10.0,
            y: -5.0,
            width: 30.0,
            height: 30.0,
            confidence: 1.0,
        };
        let crop = bb.crop_from(&frame).unwrap();
        assert_eq!(crop.width(), 30);
        assert_eq!(crop.height(), 30);
    }
}
