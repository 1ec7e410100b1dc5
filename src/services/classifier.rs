//! Pretrained cascade classifier behind a narrow capability trait.
//!
//! The model is loaded once at startup and shared immutably across requests;
//! invocation is reentrant and side-effect free. Scores are classifier-native
//! units (not probabilities) and flow through the pipeline unchanged.

use std::io::Cursor;

use thiserror::Error;

/// SeetaFace stage threshold below which candidate windows are discarded
/// by the engine itself. Confidence filtering against `MIN_CONFIDENCE`
/// happens downstream, on top of this floor.
const ENGINE_SCORE_FLOOR: f64 = 2.0;

/// A raw candidate region straight from the classifier: a square of side
/// `scale` centered at (`col`, `row`), scored in classifier-native units.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub row: i32,
    pub col: i32,
    pub scale: i32,
    pub score: f32,
}

/// Sliding-window tuning forwarded to the classifier on every invocation.
#[derive(Debug, Clone)]
pub struct CascadeParams {
    pub min_size: u32,
    pub max_size: u32,
    pub shift_factor: f32,
    pub scale_factor: f32,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load cascade model: {0}")]
    Load(String),
    #[error("classifier invocation failed: {0}")]
    Run(String),
}

/// Opaque face classifier capability.
///
/// `samples` is a row-major single-channel grayscale buffer of
/// `rows` × `cols` bytes. `angle` is the scan rotation in radians; the
/// pipeline always passes 0.0.
pub trait FaceClassifier: Send + Sync {
    fn run(
        &self,
        samples: &[u8],
        rows: u32,
        cols: u32,
        params: &CascadeParams,
        angle: f32,
    ) -> Result<Vec<RawDetection>, ClassifierError>;
}

/// Classifier backed by the `rustface` crate (SeetaFace engine).
///
/// The parsed model is cheap to clone, so each invocation builds a fresh
/// detector from the shared handle; the handle itself is never mutated.
pub struct RustfaceClassifier {
    model: rustface::Model,
}

impl RustfaceClassifier {
    /// Parse a detector from raw model bytes. Called once at startup.
    pub fn load(model_bytes: &[u8]) -> Result<Self, ClassifierError> {
        let model = rustface::read_model(Cursor::new(model_bytes))
            .map_err(|e| ClassifierError::Load(format!("{e:?}")))?;
        Ok(Self { model })
    }
}

impl FaceClassifier for RustfaceClassifier {
    fn run(
        &self,
        samples: &[u8],
        rows: u32,
        cols: u32,
        params: &CascadeParams,
        _angle: f32,
    ) -> Result<Vec<RawDetection>, ClassifierError> {
        // SeetaFace only scans upright windows; the angle parameter exists
        // for cascade backends that support rotated scans.
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(params.min_size);
        detector.set_score_thresh(ENGINE_SCORE_FLOOR);
        // The engine shrinks the image pyramid by a <1 factor, where the
        // cascade params grow the scan window by a >1 factor.
        detector.set_pyramid_scale_factor(1.0 / params.scale_factor);
        let step = ((params.shift_factor * params.min_size as f32) as u32).max(1);
        detector.set_slide_window_step(step, step);

        let faces = detector.detect(&rustface::ImageData::new(samples, cols, rows));

        let max_scale = params.max_size as i32;
        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                let width = bbox.width() as i32;
                let height = bbox.height() as i32;
                RawDetection {
                    row: bbox.y() + height / 2,
                    col: bbox.x() + width / 2,
                    scale: width.max(height),
                    score: face.score() as f32,
                }
            })
            .filter(|det| det.scale <= max_scale)
            .collect())
    }
}
