//! HTTP surface.
//!
//! - [`bookings`] - create, look up, cancel, availability and free slots
//! - [`floorplans`] - floor plan metadata, whole-set overlay saves, history
//! - [`overlays`] - read-only overlay lookups

pub mod bookings;
pub mod dto;
pub mod error;
pub mod extract;
pub mod floorplans;
pub mod overlays;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{IdentityProvider, Principal};
use crate::engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Full application: routes, state and middleware.
pub fn router(state: AppState, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/me", get(me))
        .merge(bookings::router())
        .merge(floorplans::router())
        .merge(overlays::router())
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "floorsync floor plan and booking API" }))
}

/// GET /me
async fn me(principal: Principal) -> Json<Principal> {
    Json(principal)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        crate::observability::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        crate::observability::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
    response
}
