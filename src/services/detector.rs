//! Detection orchestration: grayscale conversion, classifier invocation,
//! clustering, confidence filtering, and selfie quality scoring.

use std::cmp::Ordering;
use std::sync::Arc;

use image::DynamicImage;

use crate::config::CascadeConfig;
use crate::models::{Face, SelfieValidationResponse};
use crate::services::classifier::{CascadeParams, FaceClassifier, RawDetection};
use crate::services::error::ApiError;

/// Mean-confidence floor below which a selfie is rejected, in
/// classifier-native units.
const LOW_CONFIDENCE_THRESHOLD: f32 = 10.0;

/// Runs the classifier capability over an image and post-processes the raw
/// detections into canonical face boxes.
pub struct FaceDetector {
    classifier: Arc<dyn FaceClassifier>,
    config: CascadeConfig,
}

impl FaceDetector {
    pub fn new(classifier: Arc<dyn FaceClassifier>, config: CascadeConfig) -> Self {
        Self { classifier, config }
    }

    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<Face>, ApiError> {
        let gray = img.to_luma8();
        let (cols, rows) = gray.dimensions();

        let params = CascadeParams {
            min_size: self.config.min_size,
            max_size: self.config.max_size,
            shift_factor: self.config.shift_factor,
            scale_factor: self.config.scale_factor,
        };

        let detections = self
            .classifier
            .run(gray.as_raw(), rows, cols, &params, 0.0)
            .map_err(|e| ApiError::DetectionFailed(e.to_string()))?;

        let clustered = cluster_detections(detections, self.config.iou_threshold);

        Ok(clustered
            .into_iter()
            .filter(|det| det.score >= self.config.min_confidence)
            .map(|det| Face::from(&det))
            .collect())
    }
}

impl From<&RawDetection> for Face {
    fn from(det: &RawDetection) -> Self {
        // Truncating division, so the box is shifted up-left by one pixel
        // for odd scales. Callers depend on these exact coordinates.
        Face {
            x: det.col - det.scale / 2,
            y: det.row - det.scale / 2,
            width: det.scale,
            height: det.scale,
            confidence: det.score,
        }
    }
}

/// Non-max-merge: collapse overlapping detections into their highest-scored
/// member.
///
/// Detections are processed in descending score order (stable for ties), so
/// the outcome does not depend on the order the classifier emitted them.
/// Each unclustered detection seeds a group and absorbs every remaining
/// detection whose IoU with it strictly exceeds `iou_threshold`.
fn cluster_detections(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut assigned = vec![false; detections.len()];
    let mut representatives = Vec::new();

    for i in 0..detections.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        for j in (i + 1)..detections.len() {
            if !assigned[j] && iou(&detections[i], &detections[j]) > iou_threshold {
                assigned[j] = true;
            }
        }
        representatives.push(detections[i].clone());
    }

    representatives
}

/// Intersection-over-union of the square regions of two detections.
fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let (ax0, ay0) = (a.col - a.scale / 2, a.row - a.scale / 2);
    let (bx0, by0) = (b.col - b.scale / 2, b.row - b.scale / 2);

    let ix = (ax0 + a.scale).min(bx0 + b.scale) - ax0.max(bx0);
    let iy = (ay0 + a.scale).min(by0 + b.scale) - ay0.max(by0);
    if ix <= 0 || iy <= 0 {
        return 0.0;
    }

    let intersection = (ix as f32) * (iy as f32);
    let union = (a.scale as f32) * (a.scale as f32) + (b.scale as f32) * (b.scale as f32)
        - intersection;
    intersection / union
}

/// Score a face list for selfie acceptability.
///
/// Pure function over the detected faces; confidence stays in
/// classifier-native units.
pub fn validate_selfie(faces: &[Face], min_faces: u32, max_faces: u32) -> SelfieValidationResponse {
    let face_count = faces.len();
    let mut issues = Vec::new();
    let mut is_valid = true;
    let mut confidence = 0.0f32;

    if (face_count as u32) < min_faces {
        is_valid = false;
        if face_count == 0 {
            issues.push("No faces detected in image".to_string());
            issues.push("Image may be too dark or blurry".to_string());
        } else {
            issues.push(format!(
                "Too few faces detected ({face_count} found, expected at least {min_faces})"
            ));
        }
    } else if (face_count as u32) > max_faces {
        is_valid = false;
        issues.push(format!(
            "Multiple faces detected ({face_count} found, expected {max_faces})"
        ));
    }

    if face_count > 0 {
        let total: f32 = faces.iter().map(|f| f.confidence).sum();
        confidence = total / face_count as f32;

        if confidence < LOW_CONFIDENCE_THRESHOLD {
            is_valid = false;
            issues.push("Low confidence score for detected face(s)".to_string());
        }
    }

    SelfieValidationResponse {
        is_valid,
        issues,
        confidence,
        face_count,
    }
}
