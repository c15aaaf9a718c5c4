use thiserror::Error;
use ulid::Ulid;

use crate::model::{Booking, Ms, Overlay};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, Ulid),

    #[error("invalid span [{start}, {end}): start must be before end")]
    InvalidSpan { start: Ms, end: Ms },

    #[error("booking conflicts with {} existing booking(s)", .0.len())]
    BookingConflict(Vec<Booking>),

    #[error("stale version: server is at {server_version}")]
    VersionConflict {
        server_version: u64,
        server_overlays: Vec<Overlay>,
    },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("timed out waiting for {0} lock")]
    LockTimeout(&'static str),

    #[error("WAL error: {0}")]
    WalError(String),

    #[error("store failure: {0}")]
    StoreFailure(String),
}

impl EngineError {
    /// Transient store-level failures; retried internally before surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::LockTimeout(_) | EngineError::WalError(_))
    }
}
