//! Environment-driven configuration with defaults.

use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub cascade: CascadeConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Per-request deadline for the acquire stage, also the outbound HTTP timeout.
    pub request_timeout_secs: u64,
}

/// Cascade classifier tuning. Score thresholds are in classifier-native
/// units, not probabilities.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub model_path: String,
    pub min_size: u32,
    pub max_size: u32,
    pub shift_factor: f32,
    pub scale_factor: f32,
    pub iou_threshold: f32,
    pub min_confidence: f32,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_image_size: u64,
    pub max_width: u32,
    pub max_height: u32,
    /// Sustained requests per second per client.
    pub rate_limit: f64,
    /// Burst capacity per client.
    pub rate_burst: u32,
}

impl Config {
    pub fn load() -> Self {
        Config {
            server: ServerConfig {
                port: env_parse("PORT", 8080),
                request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            },
            cascade: CascadeConfig {
                model_path: env::var("MODEL_PATH")
                    .unwrap_or_else(|_| "models/seeta_fd_frontal_v1.0.bin".to_string()),
                min_size: env_parse("MIN_SIZE", 25),
                max_size: env_parse("MAX_SIZE", 1000),
                shift_factor: env_parse("SHIFT_FACTOR", 0.2),
                scale_factor: env_parse("SCALE_FACTOR", 1.1),
                iou_threshold: env_parse("IOU_THRESHOLD", 0.6),
                min_confidence: env_parse("MIN_CONFIDENCE", 12.0),
            },
            limits: LimitsConfig {
                max_image_size: env_parse("MAX_IMAGE_SIZE", 5 * 1024 * 1024),
                max_width: env_parse("MAX_WIDTH", 2000),
                max_height: env_parse("MAX_HEIGHT", 2000),
                rate_limit: env_parse("RATE_LIMIT", 100.0),
                rate_burst: env_parse("RATE_BURST", 10),
            },
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_var_uses_default() {
        assert_eq!(env_parse("FACE_API_NO_SUCH_VAR", 42u32), 42);
        assert_eq!(env_parse("FACE_API_NO_SUCH_VAR", 0.6f32), 0.6);
    }
}
