//! Wire shapes. Field names are camelCase on the way out; on the way in the
//! snake_case spellings are accepted too.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;

use super::error::ApiError;

/// Parse an RFC 3339 timestamp. A timestamp without an offset is taken as UTC.
pub fn parse_timestamp(field: &str, raw: &str) -> Result<Ms, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().timestamp_millis())
        .map_err(|_| ApiError::Validation(format!("{field}: expected an RFC 3339 timestamp, got {raw:?}")))
}

pub fn render_timestamp(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ── Bookings ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreate {
    #[serde(alias = "space_id", alias = "overlayId", alias = "overlay_id")]
    pub space_id: Ulid,
    #[serde(alias = "startTs", alias = "start_ts")]
    pub start: String,
    #[serde(alias = "endTs", alias = "end_ts")]
    pub end: String,
    #[serde(default)]
    pub participants: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOut {
    pub id: Ulid,
    pub space_id: Ulid,
    pub organizer_id: Option<UserId>,
    pub start: String,
    pub end: String,
    pub participants: Option<u32>,
    pub status: BookingStatus,
    pub created_at: String,
}

impl From<Booking> for BookingOut {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            space_id: b.space_id,
            organizer_id: b.organizer_id,
            start: render_timestamp(b.span.start),
            end: render_timestamp(b.span.end),
            participants: b.participants,
            status: b.status,
            created_at: render_timestamp(b.created_at),
        }
    }
}

/// One entry of a 409 `booking_conflict` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictOut {
    pub id: Ulid,
    pub start: String,
    pub end: String,
    pub organizer_id: Option<UserId>,
}

impl From<Booking> for ConflictOut {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            start: render_timestamp(b.span.start),
            end: render_timestamp(b.span.end),
            organizer_id: b.organizer_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct SlotOut {
    pub start: String,
    pub end: String,
}

impl From<Span> for SlotOut {
    fn from(s: Span) -> Self {
        Self {
            start: render_timestamp(s.start),
            end: render_timestamp(s.end),
        }
    }
}

// ── Floor plans ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlanCreate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default, alias = "floor_number")]
    pub floor_number: Option<i32>,
    #[serde(default, alias = "pixels_per_meter")]
    pub pixels_per_meter: Option<f64>,
    #[serde(alias = "image_path")]
    pub image_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlanOut {
    pub id: Ulid,
    pub name: Option<String>,
    pub building: Option<String>,
    pub floor_number: Option<i32>,
    pub image_path: String,
    pub pixels_per_meter: Option<f64>,
    pub version: u64,
    pub uploaded_by: Option<UserId>,
    pub created_at: String,
}

impl From<FloorPlan> for FloorPlanOut {
    fn from(p: FloorPlan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            building: p.building,
            floor_number: p.floor_number,
            image_path: p.image_path,
            pixels_per_meter: p.pixels_per_meter,
            version: p.version,
            uploaded_by: p.uploaded_by,
            created_at: render_timestamp(p.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOverlays {
    /// Optional echo of the path id; must match when present.
    #[serde(default, alias = "floor_plan_id")]
    pub floor_plan_id: Option<Ulid>,
    #[serde(alias = "client_version")]
    pub client_version: u64,
    #[serde(default)]
    pub overlays: Vec<OverlayDraft>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOk {
    pub status: &'static str,
    pub new_version: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionOut {
    pub version: u64,
    pub changes: serde_json::Value,
    pub created_by: Option<UserId>,
    pub created_at: String,
}

impl From<FloorPlanVersion> for VersionOut {
    fn from(v: FloorPlanVersion) -> Self {
        Self {
            version: v.version,
            changes: v.changes,
            created_by: v.created_by,
            created_at: render_timestamp(v.created_at),
        }
    }
}

// ── Overlays ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayOut {
    pub id: Ulid,
    pub floor_plan_id: Ulid,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    pub label: Option<String>,
    pub capacity: Option<u32>,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub props: Props,
    pub created_by: Option<UserId>,
    pub created_at: String,
}

impl From<Overlay> for OverlayOut {
    fn from(o: Overlay) -> Self {
        Self {
            id: o.id,
            floor_plan_id: o.floor_plan_id,
            kind: o.kind,
            label: o.label,
            capacity: o.capacity,
            x: o.rect.x,
            y: o.rect.y,
            width: o.rect.width,
            height: o.rect.height,
            props: o.props,
            created_by: o.created_by,
            created_at: render_timestamp(o.created_at),
        }
    }
}

pub fn list<T, U: From<T>>(items: Vec<T>) -> Vec<U> {
    items.into_iter().map(U::from).collect()
}
