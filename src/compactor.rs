use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::Engine;

/// Compact the WAL once at least `threshold` events were appended since the
/// last compaction. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appended = engine.wal_appends_since_compact().await;
    if appended < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appended} appends");
            metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            true
        }
        Err(e) => {
            // Next tick tries again.
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that keeps the WAL from growing without bound.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineSettings, NewFloorPlan};
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("floorsync_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn plan(name: &str) -> NewFloorPlan {
        NewFloorPlan {
            name: Some(name.into()),
            image_path: format!("uploads/{name}.png"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let engine = Engine::new(test_wal_path("threshold.wal"), EngineSettings::default()).unwrap();
        engine.create_floor_plan(plan("a")).await.unwrap();
        engine.create_floor_plan(plan("b")).await.unwrap();

        assert!(!compact_if_due(&engine, 3).await);
        assert_eq!(engine.wal_appends_since_compact().await, 2);

        engine.create_floor_plan(plan("c")).await.unwrap();
        assert!(compact_if_due(&engine, 3).await);
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        assert_eq!(engine.list_floor_plans().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn background_task_compacts() {
        let engine = Arc::new(
            Engine::new(test_wal_path("background.wal"), EngineSettings::default()).unwrap(),
        );
        for i in 0..5 {
            engine.create_floor_plan(plan(&format!("p{i}"))).await.unwrap();
        }
        let task = tokio::spawn(run_compactor(engine.clone(), 5, Duration::from_millis(10)));

        let mut compacted = false;
        for _ in 0..100 {
            if engine.wal_appends_since_compact().await == 0 {
                compacted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert!(compacted);
    }
}
