//! passage-core — Face encoding, gallery matching and liveness gating.
//!
//! Detection, encoding extraction and anti-spoof scoring run via ONNX
//! Runtime for CPU inference; the matcher and gallery are plain in-memory
//! structures with no side effects.

pub mod analyzer;
pub mod gallery;
pub mod liveness;
pub mod matcher;
pub mod types;

pub use analyzer::{DetectedFace, FaceAnalyzer, OnnxAnalyzer};
pub use gallery::{EnrollmentSample, Gallery, GalleryEntry, SamplePayload};
pub use liveness::{LivenessGate, LivenessScorer, LivenessVerdict, OnnxLiveness};
pub use matcher::{MatchOutcome, NearestMatcher};
pub use types::{BoundingBox, Encoding, IdentityId, ENCODING_DIM};
