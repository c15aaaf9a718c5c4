use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability;
use super::conflict::validate_span;
use super::{Engine, EngineError};

impl Engine {
    pub async fn get_floor_plan(&self, id: Ulid) -> Result<FloorPlan, EngineError> {
        Ok(self.read_floor_plan(id).await?.plan.clone())
    }

    /// All floor plans, newest first.
    pub async fn list_floor_plans(&self) -> Result<Vec<FloorPlan>, EngineError> {
        let mut plans = Vec::new();
        for fp in self.store.floor_plan_handles() {
            let guard = tokio::time::timeout(self.settings.lock_timeout, fp.read_owned())
                .await
                .map_err(|_| EngineError::LockTimeout("floor plan"))?;
            if !guard.deleted {
                plans.push(guard.plan.clone());
            }
        }
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(plans)
    }

    /// Version history, newest first.
    pub async fn list_versions(&self, floor_plan_id: Ulid) -> Result<Vec<FloorPlanVersion>, EngineError> {
        let fp = self.read_floor_plan(floor_plan_id).await?;
        Ok(fp.versions.iter().rev().cloned().collect())
    }

    pub async fn list_overlays(&self, floor_plan_id: Ulid) -> Result<Vec<Overlay>, EngineError> {
        let fp = self.read_floor_plan(floor_plan_id).await?;
        self.current_overlays(&fp).await
    }

    pub async fn get_overlay(&self, id: Ulid) -> Result<Overlay, EngineError> {
        Ok(self.read_space(id).await?.overlay.clone())
    }

    /// Current overlay set of a floor plan whose lock the caller holds.
    pub(super) async fn current_overlays(&self, fp: &FloorPlanState) -> Result<Vec<Overlay>, EngineError> {
        let mut overlays = Vec::with_capacity(fp.overlay_ids.len());
        for id in &fp.overlay_ids {
            overlays.push(self.read_space(*id).await?.overlay.clone());
        }
        Ok(overlays)
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let space_id = self
            .store
            .space_for_booking(&id)
            .ok_or(EngineError::NotFound("booking", id))?;
        let space = self.read_space(space_id).await?;
        space
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(EngineError::NotFound("booking", id))
    }

    /// Bookings of one space ordered by start. Unknown spaces have none.
    pub async fn list_bookings(&self, space_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        match self.read_space(space_id).await {
            Ok(space) => Ok(space.bookings.clone()),
            Err(EngineError::NotFound(..)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Rooms (capacity ≥ `min_capacity` when given) with no blocking booking
    /// overlapping `[start, end)`, ordered by id.
    pub async fn available_spaces(
        &self,
        start: Ms,
        end: Ms,
        min_capacity: Option<u32>,
    ) -> Result<Vec<Overlay>, EngineError> {
        let window = validate_span(start, end, MAX_QUERY_WINDOW_MS)?;
        let mut free = Vec::new();
        for space in self.store.space_handles() {
            let guard = tokio::time::timeout(self.settings.lock_timeout, space.read_owned())
                .await
                .map_err(|_| EngineError::LockTimeout("space"))?;
            if availability::is_available(&guard, &window, min_capacity) {
                free.push(guard.overlay.clone());
            }
        }
        free.sort_by_key(|o| o.id);
        Ok(free)
    }

    /// Unbooked sub-windows of `[start, end)` on one space.
    pub async fn free_slots(&self, space_id: Ulid, start: Ms, end: Ms) -> Result<Vec<Span>, EngineError> {
        let window = validate_span(start, end, MAX_QUERY_WINDOW_MS)?;
        let space = self.read_space(space_id).await?;
        Ok(availability::free_slots(&space, &window))
    }
}
