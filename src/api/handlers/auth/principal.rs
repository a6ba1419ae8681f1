//! Bearer-token authentication for protected endpoints.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthState;
use super::tokens::decode_access_token;

/// The verified caller identity carried by a valid access token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub role: String,
}

/// Resolve the caller from the `Authorization: Bearer` header.
///
/// Purely signature-based; no store access. Access tokens are never
/// persisted, so possession of a valid signature is the whole proof.
pub fn require_auth(headers: &HeaderMap, state: &AuthState) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::InvalidAccessToken)?;
    let claims = decode_access_token(state.keys(), state.config().token_issuer(), &token)?;
    let account_id =
        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidAccessToken)?;
    Ok(Principal {
        account_id,
        email: claims.email,
        role: claims.role,
    })
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
