//! Bearer-token authentication.
//!
//! Tokens are issued by the external auth service; this crate only
//! verifies them. The claims carry everything event producers embed in
//! payloads (email, username), so handlers never call back into auth.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use common::{Actor, UserId};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A buyer.
    User,
    /// A seller with dashboard access.
    Seller,
}

/// JWT claims as issued by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    /// Expiry as a unix timestamp.
    pub exp: usize,
}

/// Verifies (and, for tests and tooling, issues) bearer tokens.
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenVerifier {
    /// Creates a verifier from the shared signing secret.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Signs a token for the given claims.
    pub fn issue(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
    }

    /// Verifies a token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
    }
}

/// The authenticated caller, extracted from the bearer or cookie token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub actor: Actor,
    pub role: Role,
    /// The raw token, forwarded to downstream services.
    pub token: String,
}

impl AuthUser {
    /// Rejects callers without the seller role.
    pub fn require_seller(&self) -> Result<(), ApiError> {
        if self.role == Role::Seller {
            Ok(())
        } else {
            Err(ApiError::Forbidden("seller role required".to_string()))
        }
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        return Some(token.to_string());
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix("token="))
        .map(String::from)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<Arc<TokenVerifier>>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("token verifier not configured".to_string()))?;

        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("authorization token missing".to_string()))?;

        let claims = verifier
            .verify(&token)
            .map_err(|_| ApiError::Unauthorized("invalid or expired token".to_string()))?;

        Ok(AuthUser {
            actor: Actor::new(
                UserId::from_uuid(claims.sub),
                claims.email,
                claims.username,
            ),
            role: claims.role,
            token,
        })
    }
}
