//! Authenticated self-service endpoints.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::principal::require_auth;
use super::auth::storage;
use super::auth::{AccountResponse, AuthError, AuthState, ErrorBody};

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated account profile", body = AccountResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn get_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match storage::lookup_account_by_id(&pool, principal.account_id).await {
        Ok(Some(account)) => Json(AccountResponse::from(&account)).into_response(),
        // The token outlived its account.
        Ok(None) => AuthError::NotFound.into_response(),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}
