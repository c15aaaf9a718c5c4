use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ulid::Ulid;

use super::AppState;
use super::dto::{self, OverlayOut};
use super::error::ApiResult;
use super::extract::ApiPath;

/// Read-only: overlays only change through a whole-set save, which keeps the
/// floor plan's version history complete.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overlays/floorplan/{floor_plan_id}", get(list_for_floor_plan))
        .route("/overlays/{id}", get(get_by_id))
}

async fn list_for_floor_plan(
    State(state): State<AppState>,
    ApiPath(floor_plan_id): ApiPath<Ulid>,
) -> ApiResult<Json<Vec<OverlayOut>>> {
    Ok(Json(dto::list(state.engine.list_overlays(floor_plan_id).await?)))
}

async fn get_by_id(State(state): State<AppState>, ApiPath(id): ApiPath<Ulid>) -> ApiResult<Json<OverlayOut>> {
    Ok(Json(state.engine.get_overlay(id).await?.into()))
}
