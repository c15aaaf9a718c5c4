use tokio::sync::OwnedRwLockWriteGuard;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::now_ms;
use super::{Engine, EngineError};

/// Metadata for a newly uploaded floor plan. The image itself lives with the
/// file-storage collaborator; we only keep its path.
#[derive(Debug, Clone, Default)]
pub struct NewFloorPlan {
    pub name: Option<String>,
    pub building: Option<String>,
    pub floor_number: Option<i32>,
    pub pixels_per_meter: Option<f64>,
    pub image_path: String,
    pub uploaded_by: Option<UserId>,
}

fn validate_draft(draft: &OverlayDraft) -> Result<(), EngineError> {
    if let Some(ref l) = draft.label
        && l.len() > MAX_LABEL_LEN
    {
        return Err(EngineError::LimitExceeded("overlay label too long"));
    }
    if draft.rect.width < 0 || draft.rect.height < 0 {
        return Err(EngineError::Validation("overlay width and height must not be negative".into()));
    }
    Ok(())
}

impl Engine {
    pub async fn create_floor_plan(&self, new: NewFloorPlan) -> Result<FloorPlan, EngineError> {
        for field in [&new.name, &new.building].into_iter().flatten() {
            if field.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("floor plan name too long"));
            }
        }
        if new.image_path.len() > MAX_IMAGE_PATH_LEN {
            return Err(EngineError::LimitExceeded("image path too long"));
        }
        if self.store.floor_plan_count() >= MAX_FLOOR_PLANS {
            return Err(EngineError::LimitExceeded("too many floor plans"));
        }

        self.with_store_retry("create_floor_plan", || self.try_create_floor_plan(&new))
            .await
    }

    async fn try_create_floor_plan(&self, new: &NewFloorPlan) -> Result<FloorPlan, EngineError> {
        let _permit = self.commit_permit().await?;
        let plan = FloorPlan {
            id: Ulid::new(),
            name: new.name.clone(),
            building: new.building.clone(),
            floor_number: new.floor_number,
            pixels_per_meter: new.pixels_per_meter,
            image_path: new.image_path.clone(),
            version: 1,
            uploaded_by: new.uploaded_by,
            created_at: now_ms(),
        };
        let event = Event::FloorPlanCreated { plan: plan.clone() };
        self.wal_append(&event).await?;
        self.store.install_floor_plan(FloorPlanState::new(plan.clone()));
        info!("floor plan {} created", plan.id);
        Ok(plan)
    }

    /// Delete a floor plan with its overlays, their bookings, and its history.
    pub async fn delete_floor_plan(&self, id: Ulid) -> Result<(), EngineError> {
        self.with_store_retry("delete_floor_plan", || self.try_delete_floor_plan(id))
            .await
    }

    async fn try_delete_floor_plan(&self, id: Ulid) -> Result<(), EngineError> {
        let _permit = self.commit_permit().await?;
        let mut fp = self.write_floor_plan(id).await?;
        let mut old_spaces = self.lock_current_spaces(&fp).await?;

        self.wal_append(&Event::FloorPlanDeleted { id }).await?;
        for space in old_spaces.iter_mut() {
            self.store.retire_space(space);
        }
        self.store.remove_floor_plan(&mut fp);
        info!("floor plan {id} deleted with {} overlays", old_spaces.len());
        Ok(())
    }

    /// Optimistic-concurrency replace of a floor plan's whole overlay set.
    ///
    /// The version compare happens under the floor plan's write lock, so of
    /// several saves carrying the same `client_version` exactly one can win.
    /// On success the old overlays (and, by cascade, their bookings) are gone,
    /// the new set is in place, `version` is bumped by one, and a snapshot for
    /// the new version is appended. Returns the new version.
    pub async fn save_overlays(
        &self,
        floor_plan_id: Ulid,
        client_version: u64,
        drafts: Vec<OverlayDraft>,
        actor: Option<UserId>,
    ) -> Result<u64, EngineError> {
        if drafts.len() > MAX_OVERLAYS_PER_SAVE {
            return Err(EngineError::LimitExceeded("too many overlays"));
        }
        for draft in &drafts {
            validate_draft(draft)?;
        }

        self.with_store_retry("save_overlays", || {
            self.try_save_overlays(floor_plan_id, client_version, &drafts, actor)
        })
        .await
    }

    async fn try_save_overlays(
        &self,
        floor_plan_id: Ulid,
        client_version: u64,
        drafts: &[OverlayDraft],
        actor: Option<UserId>,
    ) -> Result<u64, EngineError> {
        let _permit = self.commit_permit().await?;
        let mut fp = self.write_floor_plan(floor_plan_id).await?;

        if client_version != fp.plan.version {
            let server_overlays = self.current_overlays(&fp).await?;
            warn!(
                "save on {floor_plan_id} rejected: client at {client_version}, server at {}",
                fp.plan.version
            );
            metrics::counter!(crate::observability::VERSION_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::VersionConflict {
                server_version: fp.plan.version,
                server_overlays,
            });
        }

        let mut old_spaces = self.lock_current_spaces(&fp).await?;

        let now = now_ms();
        let new_version = fp.plan.version + 1;
        let overlays: Vec<Overlay> = drafts
            .iter()
            .map(|d| Overlay {
                id: Ulid::new(),
                floor_plan_id,
                kind: d.kind,
                label: d.label.clone(),
                capacity: d.capacity,
                rect: d.rect,
                props: d.props.clone(),
                created_by: actor,
                created_at: now,
            })
            .collect();
        let snapshot = FloorPlanVersion {
            floor_plan_id,
            version: new_version,
            changes: snapshot_changes(drafts),
            created_by: actor,
            created_at: now,
        };

        let event = Event::OverlaysReplaced {
            floor_plan_id,
            version: new_version,
            overlays: overlays.iter().map(OverlayRecord::from_overlay).collect(),
            changes_json: snapshot.changes.to_string(),
            created_by: actor,
            created_at: now,
        };
        self.wal_append(&event).await?;

        for space in old_spaces.iter_mut() {
            self.store.retire_space(space);
        }
        self.store.apply_overlays_replaced(&mut fp, overlays, snapshot);
        debug!(
            "floor plan {floor_plan_id} saved at v{new_version}: {} overlays replaced by {}",
            old_spaces.len(),
            fp.overlay_ids.len()
        );
        Ok(new_version)
    }

    /// Write-lock every current overlay of `fp`, in id order.
    async fn lock_current_spaces(
        &self,
        fp: &FloorPlanState,
    ) -> Result<Vec<OwnedRwLockWriteGuard<SpaceState>>, EngineError> {
        let mut ids = fp.overlay_ids.clone();
        ids.sort();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.write_space(id).await?);
        }
        Ok(guards)
    }
}
