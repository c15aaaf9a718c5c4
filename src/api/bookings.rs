use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;
use ulid::Ulid;

use crate::auth::Principal;
use crate::engine::NewBooking;

use super::AppState;
use super::dto::{self, AvailabilityQuery, BookingCreate, BookingOut, OverlayOut, SlotOut, WindowQuery};
use super::error::ApiResult;
use super::extract::{ApiJson, ApiPath, ApiQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create))
        .route("/bookings/available", get(available))
        .route("/bookings/overlay/{space_id}", get(list_for_space))
        .route("/bookings/overlay/{space_id}/free", get(free_slots))
        .route("/bookings/{id}", get(get_by_id))
        .route("/bookings/{id}/cancel", post(cancel))
}

/// POST /bookings
async fn create(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<BookingCreate>,
) -> ApiResult<(StatusCode, Json<BookingOut>)> {
    let start = dto::parse_timestamp("start", &payload.start)?;
    let end = dto::parse_timestamp("end", &payload.end)?;
    let booking = state
        .engine
        .create_booking(NewBooking {
            space_id: payload.space_id,
            start,
            end,
            participants: payload.participants,
            organizer_id: Some(principal.user_id),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /bookings/{id}
async fn get_by_id(
    State(state): State<AppState>,
    _principal: Principal,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<Json<BookingOut>> {
    Ok(Json(state.engine.get_booking(id).await?.into()))
}

/// POST /bookings/{id}/cancel - organizer or admin only
async fn cancel(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<Json<BookingOut>> {
    let cancelled = state.engine.cancel_booking(id, principal).await?;
    info!("user {} cancelled booking {id}", principal.user_id);
    Ok(Json(cancelled.into()))
}

/// GET /bookings/overlay/{space_id}
async fn list_for_space(
    State(state): State<AppState>,
    ApiPath(space_id): ApiPath<Ulid>,
) -> ApiResult<Json<Vec<BookingOut>>> {
    Ok(Json(dto::list(state.engine.list_bookings(space_id).await?)))
}

/// GET /bookings/available?start&end&capacity
async fn available(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<AvailabilityQuery>,
) -> ApiResult<Json<Vec<OverlayOut>>> {
    let start = dto::parse_timestamp("start", &q.start)?;
    let end = dto::parse_timestamp("end", &q.end)?;
    let rooms = state.engine.available_spaces(start, end, q.capacity).await?;
    Ok(Json(dto::list(rooms)))
}

/// GET /bookings/overlay/{space_id}/free?start&end
async fn free_slots(
    State(state): State<AppState>,
    ApiPath(space_id): ApiPath<Ulid>,
    ApiQuery(q): ApiQuery<WindowQuery>,
) -> ApiResult<Json<Vec<SlotOut>>> {
    let start = dto::parse_timestamp("start", &q.start)?;
    let end = dto::parse_timestamp("end", &q.end)?;
    let slots = state.engine.free_slots(space_id, start, end).await?;
    Ok(Json(dto::list(slots)))
}
