pub mod faces;
pub mod health;

use std::sync::Arc;

use axum::Router;
use axum::middleware;

use crate::AppState;
use crate::services::rate_limit;

/// Build all routes for the API. Detection endpoints sit behind the
/// per-client rate limiter; health probes do not.
pub fn build_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(
            faces::routes()
                .layer(middleware::from_fn_with_state(state, rate_limit::middleware)),
        )
        .merge(health::routes())
}
