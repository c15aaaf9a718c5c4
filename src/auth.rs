use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::UserId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Who is making the request. Everything past the extractor trusts this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    #[serde(default)]
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,

    #[error("admin privileges required")]
    Forbidden,

    #[error("token generation failed: {0}")]
    Issue(String),
}

/// Validates request credentials. Login, signup and user storage live behind
/// this boundary.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_principal(&self, token: &str) -> Result<Principal, AuthError>;

    fn require_admin(&self, principal: Principal) -> Result<Principal, AuthError> {
        if principal.is_admin() {
            Ok(principal)
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// HS256 bearer tokens carrying `user_id` and `role`.
pub struct JwtIdentity {
    issuer: String,
    expiry_minutes: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtIdentity {
    pub fn new(secret: &str, issuer: impl Into<String>, expiry_minutes: i64) -> Self {
        Self {
            issuer: issuer.into(),
            expiry_minutes,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, principal: Principal) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: principal.user_id,
            role: principal.role,
            exp: (now + Duration::minutes(self.expiry_minutes)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AuthError::Issue(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    /// Strip the `Bearer ` scheme from an Authorization header value.
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentity {
    async fn current_principal(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.validate(token)?;
        Ok(Principal {
            user_id: claims.user_id,
            role: claims.role,
        })
    }
}
