//! Anti-spoof liveness gating.
//!
//! The scorer is a black box producing a scalar in [0, 1] (higher = more
//! likely a live face); the gate applies a single configured threshold and
//! fails closed when the scorer is unavailable. Liveness is evaluated per
//! observation independently of identity matching — a spoof of an enrolled
//! face is still rejected.

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LIVENESS_INPUT_SIZE: u32 = 224;
// ImageNet channel statistics, matching the model's training preprocessing.
const LIVENESS_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const LIVENESS_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum LivenessError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anti-spoof scoring backend: `score(face) -> [0, 1]`.
pub trait LivenessScorer {
    fn score(&mut self, face: &RgbImage) -> Result<f32, LivenessError>;
}

/// Verdict of the liveness gate for one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LivenessVerdict {
    Live { score: f32 },
    Spoof { score: f32 },
    /// Scoring backend failed — treated as not live (fail closed).
    Unavailable,
}

impl LivenessVerdict {
    pub fn is_live(&self) -> bool {
        matches!(self, LivenessVerdict::Live { .. })
    }
}

/// Threshold gate over a [`LivenessScorer`].
///
/// The threshold is deployment calibration, not logic: lower values are
/// permissive (fewer false rejects, more accepted spoofs). It is exposed
/// as one named parameter and never hardcoded at call sites.
#[derive(Debug, Clone, Copy)]
pub struct LivenessGate {
    pub threshold: f32,
}

impl LivenessGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Score a face crop and apply the threshold. A score below the
    /// threshold is a spoof; a scorer failure fails closed.
    pub fn assess(&self, scorer: &mut dyn LivenessScorer, face: &RgbImage) -> LivenessVerdict {
        match scorer.score(face) {
            Ok(score) if score < self.threshold => LivenessVerdict::Spoof { score },
            Ok(score) => LivenessVerdict::Live { score },
            Err(err) => {
                tracing::warn!(error = %err, "liveness scoring unavailable — failing closed");
                LivenessVerdict::Unavailable
            }
        }
    }
}

/// DeepPixBiS-style ONNX liveness scorer.
///
/// The model emits a pixel-wise map head and a binary head; the score is
/// the mean of the per-head means, clamped to [0, 1].
pub struct OnnxLiveness {
    session: Session,
    output_count: usize,
}

impl OnnxLiveness {
    pub fn load(model_path: &str) -> Result<Self, LivenessError> {
        if !Path::new(model_path).exists() {
            return Err(LivenessError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_count = session.outputs().len();
        if output_count == 0 {
            return Err(LivenessError::InferenceFailed(
                "model declares no outputs".to_string(),
            ));
        }

        tracing::info!(
            path = model_path,
            outputs = output_count,
            "liveness model loaded"
        );
        Ok(Self {
            session,
            output_count,
        })
    }

    fn preprocess(face: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            face,
            LIVENESS_INPUT_SIZE,
            LIVENESS_INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let s = LIVENESS_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let v = pixel.0[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] =
                    (v - LIVENESS_MEAN[c]) / LIVENESS_STD[c];
            }
        }
        tensor
    }
}

impl LivenessScorer for OnnxLiveness {
    fn score(&mut self, face: &RgbImage) -> Result<f32, LivenessError> {
        let input = Self::preprocess(face);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut head_means = Vec::with_capacity(self.output_count);
        for idx in 0..self.output_count {
            let (_, data) = outputs[idx].try_extract_tensor::<f32>().map_err(|e| {
                LivenessError::InferenceFailed(format!("output {idx}: {e}"))
            })?;
            if data.is_empty() {
                continue;
            }
            head_means.push(data.iter().sum::<f32>() / data.len() as f32);
        }

        if head_means.is_empty() {
            return Err(LivenessError::InferenceFailed(
                "all model outputs were empty".to_string(),
            ));
        }

        let score = head_means.iter().sum::<f32>() / head_means.len() as f32;
        Ok(score.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubScorer {
        result: Result<f32, ()>,
    }

    impl LivenessScorer for StubScorer {
        fn score(&mut self, _face: &RgbImage) -> Result<f32, LivenessError> {
            self.result.map_err(|_| {
                LivenessError::InferenceFailed("backend down".to_string())
            })
        }
    }

    fn face() -> RgbImage {
        RgbImage::new(32, 32)
    }

    #[test]
    fn test_below_threshold_is_spoof() {
        let gate = LivenessGate::new(0.23);
        let mut scorer = StubScorer { result: Ok(0.10) };
        let verdict = gate.assess(&mut scorer, &face());
        assert_eq!(verdict, LivenessVerdict::Spoof { score: 0.10 });
        assert!(!verdict.is_live());
    }

    #[test]
    fn test_above_threshold_is_live() {
        let gate = LivenessGate::new(0.23);
        let mut scorer = StubScorer { result: Ok(0.80) };
        assert!(gate.assess(&mut scorer, &face()).is_live());
    }

    #[test]
    fn test_threshold_boundary_passes() {
        // Only scores strictly below the threshold are rejected.
        let gate = LivenessGate::new(0.23);
        let mut scorer = StubScorer { result: Ok(0.23) };
        assert!(gate.assess(&mut scorer, &face()).is_live());
    }

    #[test]
    fn test_scorer_failure_fails_closed() {
        let gate = LivenessGate::new(0.23);
        let mut scorer = StubScorer { result: Err(()) };
        let verdict = gate.assess(&mut scorer, &face());
        assert_eq!(verdict, LivenessVerdict::Unavailable);
        assert!(!verdict.is_live());
    }

    #[test]
    fn test_permissive_threshold() {
        // The 0.03 calibration accepts scores the 0.23 one rejects.
        let mut scorer = StubScorer { result: Ok(0.10) };
        assert!(LivenessGate::new(0.03).assess(&mut scorer, &face()).is_live());
        assert!(!LivenessGate::new(0.23).assess(&mut scorer, &face()).is_live());
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = RgbImage::from_pixel(50, 60, image::Rgb([124, 116, 104]));
        let tensor = OnnxLiveness::preprocess(&img);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        // 124/255 ≈ 0.486 ≈ ImageNet R mean, so the R channel lands near 0.
        assert!(tensor[[0, 0, 0, 0]].abs() < 0.05);
    }
}
