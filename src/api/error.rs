use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::engine::EngineError;

use super::dto::{ConflictOut, OverlayOut};

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can fail with. Every body carries `message`, the
/// machine-readable kind, plus either `detail` or the payload a client needs
/// to resolve the failure.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("stale version: server is at {server_version}")]
    VersionMismatch {
        server_version: u64,
        server_overlays: Vec<OverlayOut>,
    },

    #[error("booking conflicts with {} booking(s)", .0.len())]
    BookingConflict(Vec<ConflictOut>),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::VersionMismatch { .. } => "version_mismatch",
            ApiError::BookingConflict(_) => "booking_conflict",
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation(_) => "validation",
            ApiError::StoreFailure(_) => "store_failure",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::VersionMismatch { .. } | ApiError::BookingConflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.kind();
        let body = match self {
            ApiError::VersionMismatch {
                server_version,
                server_overlays,
            } => json!({
                "message": message,
                "serverVersion": server_version,
                "serverOverlays": server_overlays,
            }),
            ApiError::BookingConflict(conflicts) => json!({
                "message": message,
                "conflicts": conflicts,
            }),
            ApiError::StoreFailure(detail) => {
                error!(error = %detail, "store failure surfaced to client");
                json!({ "message": message, "detail": "storage temporarily unavailable, retry later" })
            }
            ApiError::Internal(detail) => {
                error!(error = %detail, "internal error");
                json!({ "message": message, "detail": "internal server error" })
            }
            ApiError::NotFound(detail)
            | ApiError::Unauthenticated(detail)
            | ApiError::Forbidden(detail)
            | ApiError::Validation(detail) => json!({ "message": message, "detail": detail }),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(axum::http::header::WWW_AUTHENTICATE, axum::http::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(..) => ApiError::NotFound(e.to_string()),
            EngineError::InvalidSpan { .. } | EngineError::Validation(_) | EngineError::LimitExceeded(_) => {
                ApiError::Validation(e.to_string())
            }
            EngineError::Forbidden(_) => ApiError::Forbidden(e.to_string()),
            EngineError::BookingConflict(conflicts) => {
                ApiError::BookingConflict(conflicts.into_iter().map(ConflictOut::from).collect())
            }
            EngineError::VersionConflict {
                server_version,
                server_overlays,
            } => ApiError::VersionMismatch {
                server_version,
                server_overlays: server_overlays.into_iter().map(OverlayOut::from).collect(),
            },
            EngineError::LockTimeout(_) | EngineError::WalError(_) | EngineError::StoreFailure(_) => {
                ApiError::StoreFailure(e.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Forbidden => ApiError::Forbidden(e.to_string()),
            AuthError::Issue(_) => ApiError::Internal(e.to_string()),
            AuthError::MissingToken | AuthError::InvalidToken(_) | AuthError::Expired => {
                metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
                warn!("auth failed: {e}");
                ApiError::Unauthenticated(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}
