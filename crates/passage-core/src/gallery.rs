//! Enrollment gallery — the flattened (identity, encoding) list matched
//! against each observed face.
//!
//! Built once per session from backend-supplied samples and read-only
//! afterwards. An identity may own several encodings (one per enrollment
//! photo); every encoding belongs to exactly one identity.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::{Encoding, IdentityId, ENCODING_DIM};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("no usable enrollment samples ({supplied} supplied, all skipped)")]
    NothingEnrolled { supplied: usize },
}

/// One enrolled (identity, encoding) pair.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub identity: IdentityId,
    pub encoding: Encoding,
}

/// A single enrollment input, either a precomputed encoding vector or raw
/// photo bytes still to be encoded.
#[derive(Debug, Clone)]
pub struct EnrollmentSample {
    pub identity: IdentityId,
    pub payload: SamplePayload,
}

#[derive(Debug, Clone)]
pub enum SamplePayload {
    Encoded(Vec<f32>),
    Photo(Vec<u8>),
}

/// Read-only enrollment gallery.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the gallery from enrollment samples.
    ///
    /// Photo samples are decoded and run through the analyzer; the first
    /// detected face supplies the encoding. A sample that cannot be used
    /// (undecodable bytes, no detectable face, wrong vector dimension) is
    /// skipped with a warning so one bad enrollment photo never blocks the
    /// whole gallery. Fails only when samples were supplied and none of
    /// them were usable.
    pub fn build(
        samples: Vec<EnrollmentSample>,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Self, GalleryError> {
        let supplied = samples.len();
        let mut entries = Vec::with_capacity(supplied);
        let mut skipped = 0usize;

        for sample in samples {
            match encode_sample(&sample, analyzer) {
                Some(encoding) => entries.push(GalleryEntry {
                    identity: sample.identity,
                    encoding,
                }),
                None => skipped += 1,
            }
        }

        if entries.is_empty() && supplied > 0 {
            return Err(GalleryError::NothingEnrolled { supplied });
        }

        tracing::info!(
            enrolled = entries.len(),
            skipped,
            "gallery built"
        );
        Ok(Self { entries })
    }
}

fn encode_sample(
    sample: &EnrollmentSample,
    analyzer: &mut dyn FaceAnalyzer,
) -> Option<Encoding> {
    match &sample.payload {
        SamplePayload::Encoded(values) => {
            if values.len() != ENCODING_DIM {
                tracing::warn!(
                    identity = %sample.identity,
                    dim = values.len(),
                    "skipping sample with wrong encoding dimension"
                );
                return None;
            }
            Some(Encoding::new(values.clone()))
        }
        SamplePayload::Photo(bytes) => {
            let image = match image::load_from_memory(bytes) {
                Ok(img) => img.to_rgb8(),
                Err(err) => {
                    tracing::warn!(
                        identity = %sample.identity,
                        error = %err,
                        "skipping undecodable enrollment photo"
                    );
                    return None;
                }
            };

            match analyzer.analyze(&image) {
                Ok(faces) => match faces.into_iter().next() {
                    Some(face) => Some(face.encoding),
                    None => {
                        tracing::warn!(
                            identity = %sample.identity,
                            "skipping enrollment photo with no detectable face"
                        );
                        None
                    }
                },
                Err(AnalyzerError::Ort(err)) => {
                    tracing::warn!(
                        identity = %sample.identity,
                        error = %err,
                        "skipping enrollment photo — inference failed"
                    );
                    None
                }
                Err(err) => {
                    tracing::warn!(
                        identity = %sample.identity,
                        error = %err,
                        "skipping enrollment photo"
                    );
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::DetectedFace;
    use crate::types::BoundingBox;
    use image::RgbImage;

    /// Analyzer stub returning a fixed set of faces per call.
    struct FixedAnalyzer {
        faces: Vec<DetectedFace>,
    }

    impl FaceAnalyzer for FixedAnalyzer {
        fn analyze(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>, AnalyzerError> {
            Ok(self.faces.clone())
        }
    }

    fn encoded_sample(id: &str, values: Vec<f32>) -> EnrollmentSample {
        EnrollmentSample {
            identity: IdentityId::from(id),
            payload: SamplePayload::Encoded(values),
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([120, 120, 120]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_build_from_encoded_samples() {
        let mut analyzer = FixedAnalyzer { faces: vec![] };
        let gallery = Gallery::build(
            vec![
                encoded_sample("u1", vec![0.5; ENCODING_DIM]),
                encoded_sample("u1", vec![0.6; ENCODING_DIM]),
                encoded_sample("u2", vec![0.7; ENCODING_DIM]),
            ],
            &mut analyzer,
        )
        .unwrap();
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.entries()[0].identity.as_str(), "u1");
        assert_eq!(gallery.entries()[2].identity.as_str(), "u2");
    }

    #[test]
    fn test_wrong_dimension_skipped() {
        let mut analyzer = FixedAnalyzer { faces: vec![] };
        let gallery = Gallery::build(
            vec![
                encoded_sample("good", vec![0.5; ENCODING_DIM]),
                encoded_sample("bad", vec![0.5; 16]),
            ],
            &mut analyzer,
        )
        .unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.entries()[0].identity.as_str(), "good");
    }

    #[test]
    fn test_photo_with_no_face_skipped_not_fatal() {
        let mut analyzer = FixedAnalyzer { faces: vec![] };
        let gallery = Gallery::build(
            vec![
                EnrollmentSample {
                    identity: IdentityId::from("camera-shy"),
                    payload: SamplePayload::Photo(png_bytes()),
                },
                encoded_sample("u1", vec![0.1; ENCODING_DIM]),
            ],
            &mut analyzer,
        )
        .unwrap();
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn test_photo_sample_uses_first_face() {
        let mut analyzer = FixedAnalyzer {
            faces: vec![
                DetectedFace {
                    bbox: BoundingBox {
                        x: 0.0,
                        y: 0.0,
                        width: 8.0,
                        height: 8.0,
                        confidence: 0.9,
                    },
                    encoding: Encoding::new(vec![1.0; ENCODING_DIM]),
                },
                DetectedFace {
                    bbox: BoundingBox {
                        x: 4.0,
                        y: 4.0,
                        width: 4.0,
                        height: 4.0,
                        confidence: 0.5,
                    },
                    encoding: Encoding::new(vec![2.0; ENCODING_DIM]),
                },
            ],
        };
        let gallery = Gallery::build(
            vec![EnrollmentSample {
                identity: IdentityId::from("u1"),
                payload: SamplePayload::Photo(png_bytes()),
            }],
            &mut analyzer,
        )
        .unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.entries()[0].encoding.values[0], 1.0);
    }

    #[test]
    fn test_undecodable_photo_skipped() {
        let mut analyzer = FixedAnalyzer { faces: vec![] };
        let gallery = Gallery::build(
            vec![
                EnrollmentSample {
                    identity: IdentityId::from("u1"),
                    payload: SamplePayload::Photo(vec![0xde, 0xad, 0xbe, 0xef]),
                },
                encoded_sample("u2", vec![0.3; ENCODING_DIM]),
            ],
            &mut analyzer,
        )
        .unwrap();
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn test_all_samples_unusable_is_error() {
        let mut analyzer = FixedAnalyzer { faces: vec![] };
        let err = Gallery::build(
            vec![encoded_sample("bad", vec![0.5; 3])],
            &mut analyzer,
        )
        .unwrap_err();
        assert!(matches!(err, GalleryError::NothingEnrolled { supplied: 1 }));
    }

    #[test]
    fn test_no_samples_is_empty_gallery() {
        let mut analyzer = FixedAnalyzer { faces: vec![] };
        let gallery = Gallery::build(Vec::new(), &mut analyzer).unwrap();
        assert!(gallery.is_empty());
    }
}
