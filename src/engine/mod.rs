mod availability;
mod bookings;
mod compaction;
mod conflict;
mod error;
mod floorplans;
mod queries;
mod store;

pub use availability::{free_slots, is_available, is_candidate, merge_overlapping, subtract_intervals};
pub use bookings::NewBooking;
pub use conflict::{find_conflicts, has_conflict};
pub use error::EngineError;
pub use floorplans::NewFloorPlan;
pub use store::InMemoryStore;

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tracing::{error, warn};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedFloorPlanState = Arc<RwLock<FloorPlanState>>;
pub type SharedSpaceState = Arc<RwLock<SpaceState>>;

/// Knobs the engine takes from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on waiting for any floor-plan or space lock.
    pub lock_timeout: Duration,
    /// Extra attempts for lock timeouts and WAL failures before giving up.
    pub store_retries: u32,
    /// Linear backoff step between attempts.
    pub retry_backoff: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            store_retries: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit:
/// block for the first append, drain whatever else is already queued, then
/// one fsync for the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    // Flush what we have before compacting or reporting.
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    if result.is_ok() {
        result = wal.flush_sync();
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        error!("WAL batch of {} failed: {e}", batch.len());
        // Every caller hears "failed" and may retry, so none of the batch may
        // reach disk.
        if let Err(rollback) = wal.rollback() {
            error!("WAL rollback failed, refusing further appends: {rollback}");
        }
    }

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared from before they lock state until their event
    /// is applied; compaction takes it exclusively so no event falls between
    /// the snapshot and the log swap. Always acquired before any state lock.
    pub(super) commit_gate: RwLock<()>,
    pub(super) settings: EngineSettings,
}

impl Engine {
    pub fn new(wal_path: PathBuf, settings: EngineSettings) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = InMemoryStore::new();
        let replayed = events.len();
        for event in events {
            store.replay(event);
        }
        tracing::info!(
            "engine recovered {replayed} events, {} floor plans",
            store.floor_plan_count()
        );

        Ok(Self {
            store,
            wal_tx,
            commit_gate: RwLock::new(()),
            settings,
        })
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Bound a lock acquisition by the configured timeout.
    async fn timed<G>(&self, what: &'static str, acquire: impl Future<Output = G>) -> Result<G, EngineError> {
        tokio::time::timeout(self.settings.lock_timeout, acquire)
            .await
            .map_err(|_| EngineError::LockTimeout(what))
    }

    pub(super) async fn commit_permit(&self) -> Result<tokio::sync::RwLockReadGuard<'_, ()>, EngineError> {
        self.timed("commit", self.commit_gate.read()).await
    }

    pub(super) async fn write_floor_plan(
        &self,
        id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<FloorPlanState>, EngineError> {
        let fp = self
            .store
            .get_floor_plan(&id)
            .ok_or(EngineError::NotFound("floor plan", id))?;
        let guard = self.timed("floor plan", fp.write_owned()).await?;
        if guard.deleted {
            return Err(EngineError::NotFound("floor plan", id));
        }
        Ok(guard)
    }

    pub(super) async fn read_floor_plan(
        &self,
        id: Ulid,
    ) -> Result<OwnedRwLockReadGuard<FloorPlanState>, EngineError> {
        let fp = self
            .store
            .get_floor_plan(&id)
            .ok_or(EngineError::NotFound("floor plan", id))?;
        let guard = self.timed("floor plan", fp.read_owned()).await?;
        if guard.deleted {
            return Err(EngineError::NotFound("floor plan", id));
        }
        Ok(guard)
    }

    pub(super) async fn write_space(
        &self,
        id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<SpaceState>, EngineError> {
        let space = self
            .store
            .get_space(&id)
            .ok_or(EngineError::NotFound("space", id))?;
        let guard = self.timed("space", space.write_owned()).await?;
        if guard.retired {
            return Err(EngineError::NotFound("space", id));
        }
        Ok(guard)
    }

    pub(super) async fn read_space(
        &self,
        id: Ulid,
    ) -> Result<OwnedRwLockReadGuard<SpaceState>, EngineError> {
        let space = self
            .store
            .get_space(&id)
            .ok_or(EngineError::NotFound("space", id))?;
        let guard = self.timed("space", space.read_owned()).await?;
        if guard.retired {
            return Err(EngineError::NotFound("space", id));
        }
        Ok(guard)
    }

    /// Run `op`, retrying retryable store failures with linear backoff. Domain
    /// errors pass straight through; exhausted retries become `StoreFailure`.
    pub(super) async fn with_store_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Err(e) if e.is_retryable() => {
                    if attempt >= self.settings.store_retries {
                        error!("{op}: giving up after {} attempts: {e}", attempt + 1);
                        return Err(EngineError::StoreFailure(e.to_string()));
                    }
                    attempt += 1;
                    metrics::counter!(crate::observability::STORE_RETRIES_TOTAL, "op" => op).increment(1);
                    warn!("{op}: retrying after {e} (attempt {attempt})");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }
}
