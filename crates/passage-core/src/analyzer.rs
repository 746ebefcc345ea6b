//! ONNX face analyzer — detection plus 128-D encoding extraction.
//!
//! Runs a lightweight single-output face detector and a ResNet-style
//! encoder, both via ONNX Runtime. The analyzer is the seam the pipeline
//! and gallery builder program against; tests substitute a stub.

use crate::types::{BoundingBox, Encoding, ENCODING_DIM};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DETECT_INPUT_SIZE: u32 = 320;
const DETECT_MEAN: f32 = 127.5;
const DETECT_STD: f32 = 128.0;
const DETECT_CONFIDENCE_THRESHOLD: f32 = 0.6;
/// Values per detection row: x1, y1, x2, y2, score.
const DETECT_ROW_LEN: usize = 5;

const ENCODE_INPUT_SIZE: u32 = 150;
const ENCODE_MEAN: f32 = 127.5;
const ENCODE_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A face detected in one frame: where it is and what it encodes to.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub encoding: Encoding,
}

/// Per-frame face detection and encoding extraction.
pub trait FaceAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, AnalyzerError>;
}

/// ONNX-backed analyzer holding a detector and an encoder session.
pub struct OnnxAnalyzer {
    detector: Session,
    encoder: Session,
}

impl OnnxAnalyzer {
    /// Load both ONNX models. Fails fast when either file is missing.
    pub fn load(detector_path: &str, encoder_path: &str) -> Result<Self, AnalyzerError> {
        let detector = load_session(detector_path)?;
        let encoder = load_session(encoder_path)?;

        tracing::info!(
            detector = detector_path,
            encoder = encoder_path,
            "face analyzer models loaded"
        );

        Ok(Self { detector, encoder })
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        let input = preprocess(image, DETECT_INPUT_SIZE, DETECT_MEAN, DETECT_STD);
        let outputs = self
            .detector
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalyzerError::InferenceFailed(format!("detector output: {e}")))?;

        let sx = image.width() as f32 / DETECT_INPUT_SIZE as f32;
        let sy = image.height() as f32 / DETECT_INPUT_SIZE as f32;
        Ok(parse_detections(raw, sx, sy, DETECT_CONFIDENCE_THRESHOLD))
    }

    fn encode(&mut self, face: &RgbImage) -> Result<Encoding, AnalyzerError> {
        let input = preprocess(face, ENCODE_INPUT_SIZE, ENCODE_MEAN, ENCODE_STD);
        let outputs = self
            .encoder
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalyzerError::InferenceFailed(format!("encoder output: {e}")))?;

        if raw.len() != ENCODING_DIM {
            return Err(AnalyzerError::InferenceFailed(format!(
                "expected {ENCODING_DIM}-dim encoding, got {}",
                raw.len()
            )));
        }

        Ok(Encoding::new(raw.to_vec()))
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, AnalyzerError> {
        let boxes = self.detect(image)?;
        let mut faces = Vec::with_capacity(boxes.len());

        for bbox in boxes {
            let Some(crop) = bbox.crop_from(image) else {
                continue;
            };
            let encoding = self.encode(&crop)?;
            faces.push(DetectedFace { bbox, encoding });
        }

        Ok(faces)
    }
}

fn load_session(model_path: &str) -> Result<Session, AnalyzerError> {
    if !Path::new(model_path).exists() {
        return Err(AnalyzerError::ModelNotFound(model_path.to_string()));
    }
    Ok(Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?)
}

/// Resize an RGB image to `size`×`size` and pack it into an NCHW float
/// tensor with per-pixel `(v - mean) / std` normalization.
fn preprocess(image: &RgbImage, size: u32, mean: f32, std: f32) -> Array4<f32> {
    let resized = image::imageops::resize(
        image,
        size,
        size,
        image::imageops::FilterType::Triangle,
    );

    let s = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - mean) / std;
        }
    }
    tensor
}

/// Parse a flat `[N * 5]` detector output of (x1, y1, x2, y2, score) rows
/// in detector-input coordinates, rescaling to source coordinates and
/// dropping low-confidence rows. Results are sorted by confidence.
fn parse_detections(raw: &[f32], sx: f32, sy: f32, threshold: f32) -> Vec<BoundingBox> {
    let mut boxes: Vec<BoundingBox> = raw
        .chunks_exact(DETECT_ROW_LEN)
        .filter(|row| row[4] >= threshold)
        .map(|row| {
            let x1 = row[0] * sx;
            let y1 = row[1] * sy;
            let x2 = row[2] * sx;
            let y2 = row[3] * sy;
            BoundingBox {
                x: x1,
                y: y1,
                width: (x2 - x1).max(0.0),
                height: (y2 - y1).max(0.0),
                confidence: row[4],
            }
        })
        .collect();

    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_output_shape() {
        let img = RgbImage::new(64, 48);
        let tensor = preprocess(&img, DETECT_INPUT_SIZE, DETECT_MEAN, DETECT_STD);
        assert_eq!(
            tensor.shape(),
            &[1, 3, DETECT_INPUT_SIZE as usize, DETECT_INPUT_SIZE as usize]
        );
    }

    #[test]
    fn test_preprocess_normalization() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([128, 128, 128]));
        let tensor = preprocess(&img, 8, ENCODE_MEAN, ENCODE_STD);
        let expected = (128.0 - ENCODE_MEAN) / ENCODE_STD;
        let val = tensor[[0, 0, 0, 0]];
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_channel_order() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 128]));
        let tensor = preprocess(&img, 4, 127.5, 128.0);
        assert!(tensor[[0, 0, 0, 0]] > 0.9); // R
        assert!(tensor[[0, 1, 0, 0]] < -0.9); // G
        assert!(tensor[[0, 2, 0, 0]].abs() < 0.01); // B
    }

    #[test]
    fn test_parse_detections_filters_and_rescales() {
        // Two rows: one confident, one below threshold.
        let raw = [
            10.0, 20.0, 50.0, 60.0, 0.9, //
            5.0, 5.0, 15.0, 15.0, 0.2,
        ];
        let boxes = parse_detections(&raw, 2.0, 4.0, 0.6);
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.x, 20.0);
        assert_eq!(b.y, 80.0);
        assert_eq!(b.width, 80.0);
        assert_eq!(b.height, 160.0);
        assert_eq!(b.confidence, 0.9);
    }

    #[test]
    fn test_parse_detections_sorted_by_confidence() {
        let raw = [
            0.0, 0.0, 10.0, 10.0, 0.7, //
            0.0, 0.0, 10.0, 10.0, 0.95,
        ];
        let boxes = parse_detections(&raw, 1.0, 1.0, 0.6);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence, 0.95);
        assert_eq!(boxes[1].confidence, 0.7);
    }

    #[test]
    fn test_parse_detections_empty_input() {
        assert!(parse_detections(&[], 1.0, 1.0, 0.6).is_empty());
    }

    #[test]
    fn test_parse_detections_inverted_box_clamped() {
        // x2 < x1 — degenerate row from the model becomes a zero-size box
        // rather than a negative one.
        let raw = [50.0, 50.0, 40.0, 60.0, 0.8];
        let boxes = parse_detections(&raw, 1.0, 1.0, 0.6);
        assert_eq!(boxes[0].width, 0.0);
        assert_eq!(boxes[0].height, 10.0);
    }
}
