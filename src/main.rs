mod config;
mod models;
mod routes;
mod services;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::catch_panic::CatchPanicLayer;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::services::classifier::RustfaceClassifier;
use crate::services::detector::FaceDetector;
use crate::services::downloader::ImageDownloader;
use crate::services::rate_limit::{ClientRateLimiter, RateLimitConfig};

/// Shared request-handling state. The detector holds the classifier model
/// loaded once at startup; the limiter registry is the only mutable part.
pub struct AppState {
    pub config: Config,
    pub downloader: ImageDownloader,
    pub detector: FaceDetector,
    pub limiter: ClientRateLimiter,
    pub started_at: Instant,
}

/// Log every request with method, path, status and latency.
async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

/// Convert a handler panic into a generic INTERNAL_ERROR response; the
/// panic payload only goes to the log.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "panic recovered");

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"error":"Internal server error","code":"INTERNAL_ERROR"}"#,
        ))
        .unwrap()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::load();
    let port = cfg.server.port;

    tracing::info!(
        port,
        request_timeout_secs = cfg.server.request_timeout_secs,
        max_image_size = cfg.limits.max_image_size,
        model_path = %cfg.cascade.model_path,
        "starting face-api"
    );

    let model_bytes = std::fs::read(&cfg.cascade.model_path).unwrap_or_else(|e| {
        panic!(
            "failed to read cascade model {}: {}",
            cfg.cascade.model_path, e
        )
    });
    let classifier =
        RustfaceClassifier::load(&model_bytes).expect("failed to parse cascade model");

    let state = Arc::new(AppState {
        downloader: ImageDownloader::new(
            cfg.limits.clone(),
            Duration::from_secs(cfg.server.request_timeout_secs),
        ),
        detector: FaceDetector::new(Arc::new(classifier), cfg.cascade.clone()),
        limiter: ClientRateLimiter::new(RateLimitConfig {
            max_tokens: cfg.limits.rate_burst,
            refill_rate: cfg.limits.rate_limit,
        }),
        started_at: Instant::now(),
        config: cfg,
    });

    let app = routes::build_routes(state.clone())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum::middleware::from_fn(log_requests))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed");
}
