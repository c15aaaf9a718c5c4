use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "floorsync_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "floorsync_http_request_duration_seconds";

/// Counter: booking requests rejected for overlapping an existing booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "floorsync_booking_conflicts_total";

/// Counter: overlay saves rejected for a stale client version.
pub const VERSION_CONFLICTS_TOTAL: &str = "floorsync_version_conflicts_total";

/// Counter: token verifications that failed.
pub const AUTH_FAILURES_TOTAL: &str = "floorsync_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: store operations retried after a transient failure. Labels: op.
pub const STORE_RETRIES_TOTAL: &str = "floorsync_store_retries_total";

/// Counter: WAL compactions completed.
pub const WAL_COMPACTIONS_TOTAL: &str = "floorsync_wal_compactions_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "floorsync_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "floorsync_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
