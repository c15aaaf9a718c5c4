use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::info;
use ulid::Ulid;

use crate::auth::Principal;
use crate::engine::NewFloorPlan;

use super::AppState;
use super::dto::{self, FloorPlanCreate, FloorPlanOut, SaveOk, SaveOverlays, VersionOut};
use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/floorplans", get(list).post(create))
        .route("/floorplans/{id}", get(get_by_id).delete(delete))
        .route("/floorplans/{id}/save", put(save))
        .route("/floorplans/{id}/versions", get(versions))
}

/// POST /floorplans - the image itself is stored elsewhere; we get its path.
async fn create(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<FloorPlanCreate>,
) -> ApiResult<(StatusCode, Json<FloorPlanOut>)> {
    if payload.image_path.trim().is_empty() {
        return Err(ApiError::Validation("imagePath must not be empty".into()));
    }
    let plan = state
        .engine
        .create_floor_plan(NewFloorPlan {
            name: payload.name,
            building: payload.building,
            floor_number: payload.floor_number,
            pixels_per_meter: payload.pixels_per_meter,
            image_path: payload.image_path,
            uploaded_by: Some(principal.user_id),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

/// GET /floorplans - newest first
async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<FloorPlanOut>>> {
    Ok(Json(dto::list(state.engine.list_floor_plans().await?)))
}

/// GET /floorplans/{id}
async fn get_by_id(State(state): State<AppState>, ApiPath(id): ApiPath<Ulid>) -> ApiResult<Json<FloorPlanOut>> {
    Ok(Json(state.engine.get_floor_plan(id).await?.into()))
}

/// DELETE /floorplans/{id} - admin only
async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<StatusCode> {
    let admin = state.identity.require_admin(principal)?;
    state.engine.delete_floor_plan(id).await?;
    info!("admin {} deleted floor plan {id}", admin.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /floorplans/{id}/save
async fn save(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(payload): ApiJson<SaveOverlays>,
) -> ApiResult<Json<SaveOk>> {
    if payload.floor_plan_id.is_some_and(|body_id| body_id != id) {
        return Err(ApiError::Validation("floorPlanId does not match the path".into()));
    }
    let new_version = state
        .engine
        .save_overlays(id, payload.client_version, payload.overlays, Some(principal.user_id))
        .await?;
    Ok(Json(SaveOk {
        status: "ok",
        new_version,
    }))
}

/// GET /floorplans/{id}/versions - newest first
async fn versions(State(state): State<AppState>, ApiPath(id): ApiPath<Ulid>) -> ApiResult<Json<Vec<VersionOut>>> {
    Ok(Json(dto::list(state.engine.list_versions(id).await?)))
}
