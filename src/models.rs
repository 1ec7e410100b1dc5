//! Request and response models for the HTTP surface.
//!
//! Field names are part of the compatibility contract with callers.

use serde::{Deserialize, Serialize};

/// POST /detect request body
#[derive(Debug, Deserialize)]
pub struct FaceDetectionRequest {
    #[serde(default)]
    pub image_url: String,
}

/// POST /validate request body. Zero/absent face counts default to 1.
#[derive(Debug, Deserialize)]
pub struct SelfieValidationRequest {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub min_faces: u32,
    #[serde(default)]
    pub max_faces: u32,
}

/// POST /detect-visual request body. Empty color defaults to "red",
/// zero line width to 3.
#[derive(Debug, Deserialize)]
pub struct VisualDetectionRequest {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub circle_color: String,
    #[serde(default)]
    pub line_width: u32,
}

/// A detected face box. Width and height always equal the source
/// detection's scale; confidence is in classifier-native units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

/// Metadata derived once from the fetch/decode step, read-only after.
#[derive(Debug, Clone, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub size_bytes: u64,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct FaceDetectionResponse {
    pub faces: Vec<Face>,
    pub count: usize,
    pub image_metadata: ImageMetadata,
    pub processing_time_ms: f64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct SelfieValidationResponse {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub confidence: f32,
    pub face_count: usize,
}

#[derive(Debug, Serialize)]
pub struct VisualDetectionResponse {
    pub image_base64: String,
    pub faces: Vec<Face>,
    pub count: usize,
    pub image_metadata: ImageMetadata,
    pub processing_time_ms: f64,
}
