//! Face detection endpoints (/detect, /validate, /detect-visual)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use image::DynamicImage;
use tokio::time::timeout;

use crate::AppState;
use crate::models::{
    FaceDetectionRequest, FaceDetectionResponse, ImageMetadata, SelfieValidationRequest,
    SelfieValidationResponse, VisualDetectionRequest, VisualDetectionResponse,
};
use crate::services::detector;
use crate::services::error::ApiError;
use crate::services::renderer::{self, CircleOptions};

const DEFAULT_CIRCLE_COLOR: &str = "red";
const DEFAULT_LINE_WIDTH: u32 = 3;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/detect", post(detect))
        .route("/validate", post(validate))
        .route("/detect-visual", post(detect_visual))
}

/// Acquire stage shared by the three endpoints: bounded download and decode
/// under the per-request deadline. The deadline cancels the fetch at
/// whichever point it has reached; nothing is retried.
async fn acquire(
    state: &AppState,
    image_url: &str,
) -> Result<(DynamicImage, ImageMetadata), ApiError> {
    let deadline = Duration::from_secs(state.config.server.request_timeout_secs);
    timeout(deadline, state.downloader.download(image_url))
        .await
        .map_err(|_| ApiError::DownloadFailed("image download timed out".to_string()))?
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// POST /detect - Detect faces and return their boxes plus image metadata
async fn detect(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FaceDetectionRequest>, JsonRejection>,
) -> Result<Json<FaceDetectionResponse>, ApiError> {
    let start = Instant::now();
    let Json(req) = payload.map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let (img, metadata) = acquire(&state, &req.image_url).await?;
    let faces = state.detector.detect(&img)?;

    Ok(Json(FaceDetectionResponse {
        count: faces.len(),
        faces,
        image_metadata: metadata,
        processing_time_ms: elapsed_ms(start),
    }))
}

/// POST /validate - Score the image for selfie acceptability
async fn validate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SelfieValidationRequest>, JsonRejection>,
) -> Result<Json<SelfieValidationResponse>, ApiError> {
    let start = Instant::now();
    let Json(req) = payload.map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let min_faces = if req.min_faces == 0 { 1 } else { req.min_faces };
    let max_faces = if req.max_faces == 0 { 1 } else { req.max_faces };

    let (img, _metadata) = acquire(&state, &req.image_url).await?;
    let faces = state.detector.detect(&img)?;

    let response = detector::validate_selfie(&faces, min_faces, max_faces);

    tracing::info!(
        url = %req.image_url,
        faces_detected = faces.len(),
        is_valid = response.is_valid,
        processing_time_ms = elapsed_ms(start),
        "selfie validation completed"
    );

    Ok(Json(response))
}

/// POST /detect-visual - Detect faces and return the image annotated with
/// circle markers as a base64 JPEG data URL
async fn detect_visual(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VisualDetectionRequest>, JsonRejection>,
) -> Result<Json<VisualDetectionResponse>, ApiError> {
    let start = Instant::now();
    let Json(req) = payload.map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let circle_color = if req.circle_color.is_empty() {
        DEFAULT_CIRCLE_COLOR
    } else {
        &req.circle_color
    };
    let line_width = if req.line_width == 0 {
        DEFAULT_LINE_WIDTH
    } else {
        req.line_width
    };

    let (img, metadata) = acquire(&state, &req.image_url).await?;
    let faces = state.detector.detect(&img)?;

    let opts = CircleOptions {
        color: renderer::parse_color(circle_color),
        line_width,
    };
    let image_base64 = renderer::draw_face_circles(&img, &faces, &opts)?;

    tracing::info!(
        url = %req.image_url,
        faces_detected = faces.len(),
        circle_color,
        line_width,
        processing_time_ms = elapsed_ms(start),
        "visual detection completed"
    );

    Ok(Json(VisualDetectionResponse {
        image_base64,
        count: faces.len(),
        faces,
        image_metadata: metadata,
        processing_time_ms: elapsed_ms(start),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::services::classifier::{
        CascadeParams, ClassifierError, FaceClassifier, RawDetection,
    };
    use crate::services::detector::FaceDetector;
    use crate::services::downloader::ImageDownloader;
    use crate::services::rate_limit::{ClientRateLimiter, RateLimitConfig};

    struct NoFacesClassifier;

    impl FaceClassifier for NoFacesClassifier {
        fn run(
            &self,
            _samples: &[u8],
            _rows: u32,
            _cols: u32,
            _params: &CascadeParams,
            _angle: f32,
        ) -> Result<Vec<RawDetection>, ClassifierError> {
            Ok(Vec::new())
        }
    }

    fn test_state() -> Arc<AppState> {
        let config = Config::load();
        Arc::new(AppState {
            downloader: ImageDownloader::new(config.limits.clone(), Duration::from_secs(5)),
            detector: FaceDetector::new(Arc::new(NoFacesClassifier), config.cascade.clone()),
            limiter: ClientRateLimiter::new(RateLimitConfig {
                max_tokens: 100,
                refill_rate: 100.0,
            }),
            started_at: Instant::now(),
            config,
        })
    }

    async fn post_json(uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let app = routes().with_state(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_request() {
        let (status, body) = post_json("/detect", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn missing_image_url_is_invalid_url() {
        let (status, body) = post_json("/detect", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_URL");
    }

    #[tokio::test]
    async fn private_host_is_rejected() {
        let (status, body) =
            post_json("/validate", r#"{"image_url":"http://127.0.0.1/a.jpg"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_URL");
    }

    #[tokio::test]
    async fn ftp_scheme_is_rejected() {
        let (status, body) =
            post_json("/detect-visual", r#"{"image_url":"ftp://example.com/a.jpg"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_URL");
    }

    #[tokio::test]
    async fn error_responses_do_not_leak_detail() {
        let (_, body) = post_json("/detect", r#"{"image_url":"http://10.0.0.8/a.jpg"}"#).await;
        assert_eq!(body["error"], "Invalid image URL");
        assert!(body.get("detail").is_none());
    }
}
