use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::{SharedFloorPlanState, SharedSpaceState};

/// Live state plus the reverse indexes. Apply methods assume the caller holds
/// the write guards they are handed; lock order is floor plan, then space.
pub struct InMemoryStore {
    floor_plans: DashMap<Ulid, SharedFloorPlanState>,
    spaces: DashMap<Ulid, SharedSpaceState>,
    booking_to_space: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            floor_plans: DashMap::new(),
            spaces: DashMap::new(),
            booking_to_space: DashMap::new(),
        }
    }

    // ── Floor plans ──────────────────────────────────────────

    pub fn floor_plan_count(&self) -> usize {
        self.floor_plans.len()
    }

    pub fn get_floor_plan(&self, id: &Ulid) -> Option<SharedFloorPlanState> {
        self.floor_plans.get(id).map(|e| e.value().clone())
    }

    /// Handles are cloned out so no map shard stays locked across an await.
    pub fn floor_plan_handles(&self) -> Vec<SharedFloorPlanState> {
        self.floor_plans.iter().map(|e| e.value().clone()).collect()
    }

    pub fn install_floor_plan(&self, state: FloorPlanState) {
        self.floor_plans
            .insert(state.plan.id, Arc::new(RwLock::new(state)));
    }

    pub fn remove_floor_plan(&self, fp: &mut FloorPlanState) {
        fp.deleted = true;
        self.floor_plans.remove(&fp.plan.id);
    }

    // ── Spaces ───────────────────────────────────────────────

    pub fn get_space(&self, id: &Ulid) -> Option<SharedSpaceState> {
        self.spaces.get(id).map(|e| e.value().clone())
    }

    pub fn space_handles(&self) -> Vec<SharedSpaceState> {
        self.spaces.iter().map(|e| e.value().clone()).collect()
    }

    /// Drop an overlay together with its bookings.
    pub fn retire_space(&self, space: &mut SpaceState) {
        space.retired = true;
        for booking in space.bookings.drain(..) {
            self.booking_to_space.remove(&booking.id);
        }
        self.spaces.remove(&space.overlay.id);
    }

    /// Insert a fresh overlay set, version bump and snapshot. Old spaces must
    /// already be retired.
    pub fn apply_overlays_replaced(
        &self,
        fp: &mut FloorPlanState,
        overlays: Vec<Overlay>,
        snapshot: FloorPlanVersion,
    ) {
        fp.overlay_ids = overlays.iter().map(|o| o.id).collect();
        for overlay in overlays {
            self.spaces
                .insert(overlay.id, Arc::new(RwLock::new(SpaceState::new(overlay))));
        }
        fp.plan.version = snapshot.version;
        fp.versions.push(snapshot);
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn space_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_space.get(booking_id).map(|e| *e.value())
    }

    pub fn insert_booking(&self, space: &mut SpaceState, booking: Booking) {
        self.booking_to_space.insert(booking.id, space.overlay.id);
        space.insert_booking(booking);
    }

    pub fn set_booking_status(&self, space: &mut SpaceState, id: Ulid, status: BookingStatus) {
        if let Some(b) = space.booking_mut(id) {
            b.status = status;
        }
    }

    // ── Replay ───────────────────────────────────────────────

    /// Apply a recovered event. We're the sole owner of every Arc here, so
    /// try_write always succeeds instantly; never block, this may run inside
    /// an async context.
    pub fn replay(&self, event: Event) {
        match event {
            Event::FloorPlanCreated { plan } => {
                self.install_floor_plan(FloorPlanState::new(plan));
            }
            Event::FloorPlanDeleted { id } => {
                let Some(fp) = self.get_floor_plan(&id) else { return };
                let Ok(mut fp) = fp.try_write() else { return };
                self.retire_spaces_uncontended(&fp.overlay_ids);
                self.remove_floor_plan(&mut fp);
            }
            Event::OverlaysReplaced {
                floor_plan_id,
                version,
                overlays,
                changes_json,
                created_by,
                created_at,
            } => {
                let Some(fp) = self.get_floor_plan(&floor_plan_id) else {
                    tracing::warn!("replay: overlays for unknown floor plan {floor_plan_id}");
                    return;
                };
                let Ok(mut fp) = fp.try_write() else { return };
                if version != fp.plan.version + 1 {
                    tracing::warn!(
                        "replay: skipping overlays for {floor_plan_id} at v{version}, floor plan is at v{}",
                        fp.plan.version
                    );
                    return;
                }
                self.retire_spaces_uncontended(&fp.overlay_ids);
                let overlays = overlays
                    .into_iter()
                    .map(|r| r.into_overlay(floor_plan_id))
                    .collect();
                let snapshot = VersionRecord {
                    version,
                    changes_json,
                    created_by,
                    created_at,
                }
                .into_version(floor_plan_id);
                self.apply_overlays_replaced(&mut fp, overlays, snapshot);
            }
            Event::BookingCreated { booking } => {
                let Some(space) = self.get_space(&booking.space_id) else {
                    tracing::warn!("replay: booking {} for unknown space", booking.id);
                    return;
                };
                let Ok(mut space) = space.try_write() else { return };
                if self.booking_to_space.contains_key(&booking.id) {
                    tracing::warn!("replay: skipping duplicate booking {}", booking.id);
                    return;
                }
                self.insert_booking(&mut space, booking);
            }
            Event::BookingStatusChanged { id, space_id, status } => {
                let Some(space) = self.get_space(&space_id) else { return };
                let Ok(mut space) = space.try_write() else { return };
                self.set_booking_status(&mut space, id, status);
            }
            Event::FloorPlanRestored {
                plan,
                overlays,
                versions,
            } => {
                let floor_plan_id = plan.id;
                let mut state = FloorPlanState::new(plan);
                state.versions = versions
                    .into_iter()
                    .map(|v| v.into_version(floor_plan_id))
                    .collect();
                state.overlay_ids = overlays.iter().map(|o| o.id).collect();
                for record in overlays {
                    let overlay = record.into_overlay(floor_plan_id);
                    self.spaces
                        .insert(overlay.id, Arc::new(RwLock::new(SpaceState::new(overlay))));
                }
                self.install_floor_plan(state);
            }
        }
    }

    fn retire_spaces_uncontended(&self, ids: &[Ulid]) {
        for id in ids {
            if let Some(space) = self.get_space(id)
                && let Ok(mut guard) = space.try_write()
            {
                self.retire_space(&mut guard);
            }
        }
    }
}
