use tokio::sync::oneshot;

use crate::model::*;

use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Compact the WAL by rewriting it with only the events needed to recreate
    /// the current state: one `FloorPlanRestored` per floor plan followed by
    /// its bookings.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Exclusive: no mutation may append between the snapshot and the swap.
        let _gate = self.commit_gate.write().await;

        let mut events = Vec::new();
        for fp in self.store.floor_plan_handles() {
            let fp = fp.read().await;
            if fp.deleted {
                continue;
            }
            let mut overlays = Vec::with_capacity(fp.overlay_ids.len());
            let mut bookings = Vec::new();
            for id in &fp.overlay_ids {
                let Some(space) = self.store.get_space(id) else { continue };
                let space = space.read().await;
                overlays.push(OverlayRecord::from_overlay(&space.overlay));
                bookings.extend(space.bookings.iter().cloned());
            }
            events.push(Event::FloorPlanRestored {
                plan: fp.plan.clone(),
                overlays,
                versions: fp.versions.iter().map(VersionRecord::from_version).collect(),
            });
            events.extend(bookings.into_iter().map(|booking| Event::BookingCreated { booking }));
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
