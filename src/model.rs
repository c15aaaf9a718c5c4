use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type inside the engine.
pub type Ms = i64;

/// Identity handed to us by the identity provider.
pub type UserId = i64;

/// Open property bag attached to an overlay. Never interpreted by the engine.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// `[a,b)` and `[c,d)` overlap iff `a < d && c < b`.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Clamp `self` to `window`. Caller guarantees the two overlap.
    pub fn clamp_to(&self, window: &Span) -> Span {
        Span::new(self.start.max(window.start), self.end.min(window.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Room,
    Seat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Cancelled,
}

impl BookingStatus {
    /// Cancelled bookings stay on record but no longer hold the space.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

/// Axis-aligned rectangle in plan units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// An overlay as submitted by a client in a save. This is also the shape
/// recorded in version snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayDraft {
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(flatten)]
    pub rect: Rect,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: Ulid,
    pub floor_plan_id: Ulid,
    pub kind: OverlayKind,
    pub label: Option<String>,
    pub capacity: Option<u32>,
    pub rect: Rect,
    pub props: Props,
    pub created_by: Option<UserId>,
    pub created_at: Ms,
}

impl Overlay {
    pub fn is_room(&self) -> bool {
        self.kind == OverlayKind::Room
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPlan {
    pub id: Ulid,
    pub name: Option<String>,
    pub building: Option<String>,
    pub floor_number: Option<i32>,
    pub pixels_per_meter: Option<f64>,
    pub image_path: String,
    /// Starts at 1; bumped only by a successful overlay save.
    pub version: u64,
    pub uploaded_by: Option<UserId>,
    pub created_at: Ms,
}

/// Immutable snapshot written once per version.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorPlanVersion {
    pub floor_plan_id: Ulid,
    pub version: u64,
    pub changes: serde_json::Value,
    pub created_by: Option<UserId>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub space_id: Ulid,
    pub organizer_id: Option<UserId>,
    pub span: Span,
    pub participants: Option<u32>,
    pub status: BookingStatus,
    pub created_at: Ms,
}

// ── Live state ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FloorPlanState {
    pub plan: FloorPlan,
    /// Ids of the current overlay set, in submission order.
    pub overlay_ids: Vec<Ulid>,
    /// Snapshots in ascending version order.
    pub versions: Vec<FloorPlanVersion>,
    /// Set once the floor plan is deleted; late lock holders must treat it as gone.
    pub deleted: bool,
}

impl FloorPlanState {
    pub fn new(plan: FloorPlan) -> Self {
        let initial = FloorPlanVersion {
            floor_plan_id: plan.id,
            version: plan.version,
            changes: snapshot_changes(&[]),
            created_by: plan.uploaded_by,
            created_at: plan.created_at,
        };
        Self {
            plan,
            overlay_ids: Vec::new(),
            versions: vec![initial],
            deleted: false,
        }
    }
}

/// One overlay and its bookings. Every overlay gets a space entry; only rooms
/// accept bookings.
#[derive(Debug, Clone)]
pub struct SpaceState {
    pub overlay: Overlay,
    /// All bookings (any status), sorted by `span.start`.
    pub bookings: Vec<Booking>,
    /// Set when the overlay is replaced by a save or its floor plan is deleted.
    pub retired: bool,
}

impl SpaceState {
    pub fn new(overlay: Overlay) -> Self {
        Self {
            overlay,
            bookings: Vec::new(),
            retired: false,
        }
    }

    /// Insert booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.start <= booking.span.start);
        self.bookings.insert(pos, booking);
    }

    /// Bookings that still hold the space. Cancelled ones stay listed but do
    /// not count against the per-space cap.
    pub fn blocking_count(&self) -> usize {
        self.bookings.iter().filter(|b| b.status.is_blocking()).count()
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings whose span overlaps the query window, any status.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self.bookings.partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }
}

/// Version snapshot payload: `{"overlays": [...]}` with the submitted drafts.
pub fn snapshot_changes(drafts: &[OverlayDraft]) -> serde_json::Value {
    serde_json::json!({ "overlays": drafts })
}

// ── WAL records ──────────────────────────────────────────────────

/// Overlay as persisted. The property bag travels as JSON text because the
/// binary codec cannot decode self-describing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRecord {
    pub id: Ulid,
    pub kind: OverlayKind,
    pub label: Option<String>,
    pub capacity: Option<u32>,
    pub rect: Rect,
    pub props_json: String,
    pub created_by: Option<UserId>,
    pub created_at: Ms,
}

impl OverlayRecord {
    pub fn from_overlay(overlay: &Overlay) -> Self {
        Self {
            id: overlay.id,
            kind: overlay.kind,
            label: overlay.label.clone(),
            capacity: overlay.capacity,
            rect: overlay.rect,
            props_json: serde_json::Value::Object(overlay.props.clone()).to_string(),
            created_by: overlay.created_by,
            created_at: overlay.created_at,
        }
    }

    pub fn into_overlay(self, floor_plan_id: Ulid) -> Overlay {
        let props = serde_json::from_str(&self.props_json).unwrap_or_else(|e| {
            tracing::warn!("overlay {}: unreadable props, using empty bag: {e}", self.id);
            Props::new()
        });
        Overlay {
            id: self.id,
            floor_plan_id,
            kind: self.kind,
            label: self.label,
            capacity: self.capacity,
            rect: self.rect,
            props,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u64,
    pub changes_json: String,
    pub created_by: Option<UserId>,
    pub created_at: Ms,
}

impl VersionRecord {
    pub fn from_version(v: &FloorPlanVersion) -> Self {
        Self {
            version: v.version,
            changes_json: v.changes.to_string(),
            created_by: v.created_by,
            created_at: v.created_at,
        }
    }

    pub fn into_version(self, floor_plan_id: Ulid) -> FloorPlanVersion {
        FloorPlanVersion {
            floor_plan_id,
            version: self.version,
            changes: serde_json::from_str(&self.changes_json).unwrap_or(serde_json::Value::Null),
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// One WAL record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    FloorPlanCreated {
        plan: FloorPlan,
    },
    FloorPlanDeleted {
        id: Ulid,
    },
    /// Old overlay set dropped, new set inserted, version bumped, snapshot appended.
    OverlaysReplaced {
        floor_plan_id: Ulid,
        version: u64,
        overlays: Vec<OverlayRecord>,
        changes_json: String,
        created_by: Option<UserId>,
        created_at: Ms,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        space_id: Ulid,
        status: BookingStatus,
    },
    /// Full floor-plan state, emitted only by compaction.
    FloorPlanRestored {
        plan: FloorPlan,
        overlays: Vec<OverlayRecord>,
        versions: Vec<VersionRecord>,
    },
}
