use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::auth::{AuthError, JwtIdentity, Principal};

use super::AppState;
use super::error::ApiError;

/// `axum::Json` whose rejections come back as `validation` errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Authenticated caller. Handlers that take a `Principal` reject requests
/// without a valid bearer token.
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(*principal);
        }

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(JwtIdentity::extract_from_header)
            .ok_or(AuthError::MissingToken)?;

        let principal = state.identity.current_principal(token).await?;
        parts.extensions.insert(principal);
        Ok(principal)
    }
}
