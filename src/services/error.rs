//! API error taxonomy shared by every pipeline stage.
//!
//! Each variant carries internal detail for the server-side log; only a
//! fixed generic message and code ever reach the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid image URL: {0}")]
    InvalidUrl(String),
    #[error("image download failed: {0}")]
    DownloadFailed(String),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("image exceeds limits: {0}")]
    TooLarge(String),
    #[error("image decode failed: {0}")]
    DecodeFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("face detection failed: {0}")]
    DetectionFailed(String),
    #[error("image rendering failed: {0}")]
    RenderFailed(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidUrl(_)
            | ApiError::DownloadFailed(_)
            | ApiError::UnsupportedFormat(_)
            | ApiError::TooLarge(_)
            | ApiError::DecodeFailed(_)
            | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DetectionFailed(_) | ApiError::RenderFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidUrl(_) => "INVALID_URL",
            ApiError::DownloadFailed(_) => "DOWNLOAD_FAILED",
            ApiError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ApiError::TooLarge(_) => "TOO_LARGE",
            ApiError::DecodeFailed(_) => "DECODE_FAILED",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::DetectionFailed(_) => "DETECTION_FAILED",
            ApiError::RenderFailed(_) => "RENDER_FAILED",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Caller-facing message; never includes internal detail.
    fn public_message(&self) -> &'static str {
        match self {
            ApiError::InvalidUrl(_) => "Invalid image URL",
            ApiError::DownloadFailed(_) => "Failed to download image",
            ApiError::UnsupportedFormat(_) => "Unsupported image format",
            ApiError::TooLarge(_) => "Image size exceeds maximum limit",
            ApiError::DecodeFailed(_) => "Failed to decode image",
            ApiError::InvalidRequest(_) => "Invalid JSON request",
            ApiError::DetectionFailed(_) => "Face detection failed",
            ApiError::RenderFailed(_) => "Failed to process image",
            ApiError::RateLimited => "Too many requests",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }

        (
            status,
            Json(json!({
                "error": self.public_message(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::InvalidUrl(String::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::DetectionFailed(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn public_messages_do_not_leak_detail() {
        let err = ApiError::DownloadFailed("connection refused to 10.1.2.3".to_string());
        assert_eq!(err.public_message(), "Failed to download image");
    }
}
