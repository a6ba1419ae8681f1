//! Refresh, logout, and session introspection endpoints.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::error::AuthError;
use super::principal::require_auth;
use super::sessions::{self, RotateOutcome};
use super::state::AuthState;
use super::storage;
use super::tokens::issue_access_token;
use super::types::{
    AccountResponse, AuthenticatedResponse, LoginResponse, LogoutRequest, RefreshRequest,
    SessionSummary,
};

/// Exchange a refresh token for a fresh access + refresh pair.
///
/// The presented token is consumed whether or not the exchange succeeds; a
/// replay after rotation is rejected. Refreshing does not count as a login,
/// so `lastLogin` is untouched.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated", body = LoginResponse),
        (status = 401, description = "Unknown, expired, or replayed refresh token", body = super::error::ErrorBody)
    ),
    tag = "session"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };
    if request.refresh_token.is_empty() {
        return AuthError::InvalidRefreshToken.into_response();
    }

    let outcome = match sessions::rotate_session(
        &pool,
        state.config().refresh_ttl_seconds(),
        &request.refresh_token,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Failed to rotate session: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    let (account_id, refresh_token) = match outcome {
        RotateOutcome::Rotated {
            account_id,
            refresh_token,
        } => (account_id, refresh_token),
        RotateOutcome::NotFound | RotateOutcome::Expired => {
            return AuthError::InvalidRefreshToken.into_response();
        }
    };

    let account = match storage::lookup_account_by_id(&pool, account_id).await {
        Ok(Some(account)) => account,
        // The account vanished under the session; treat the token as dead.
        Ok(None) => return AuthError::InvalidRefreshToken.into_response(),
        Err(err) => {
            error!("Failed to lookup account for refresh: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    let access_token = match issue_access_token(
        state.keys(),
        state.config().token_issuer(),
        state.config().access_ttl_seconds(),
        account.id,
        &account.email,
        &account.role,
    ) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue access token: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    Json(LoginResponse::Authenticated(AuthenticatedResponse {
        account: AccountResponse::from(&account),
        access_token,
        refresh_token,
    }))
    .into_response()
}

/// End the current session.
///
/// Revokes the supplied refresh token when one is given. Idempotent: an
/// already-revoked or unknown token still yields 204.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Missing or invalid access token", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "session"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let refresh_token = payload.and_then(|Json(request)| request.refresh_token);
    if let Some(token) = refresh_token.filter(|token| !token.is_empty()) {
        if let Err(err) =
            sessions::delete_session_by_token(&pool, principal.account_id, &token).await
        {
            error!("Failed to delete session on logout: {err}");
            return AuthError::InternalFailure.into_response();
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Revoke every session the account holds.
#[utoipa::path(
    post,
    path = "/v1/auth/logout-all",
    responses(
        (status = 204, description = "All sessions revoked"),
        (status = 401, description = "Missing or invalid access token", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "session"
)]
pub async fn logout_all(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match sessions::delete_account_sessions(&pool, principal.account_id).await {
        Ok(revoked) => {
            tracing::info!(
                account_id = %principal.account_id,
                account = %principal.email,
                revoked,
                "Revoked all sessions"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            error!("Failed to revoke sessions: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}

/// List the caller's active sessions, newest first. Token hashes are never
/// exposed.
#[utoipa::path(
    get,
    path = "/v1/auth/sessions",
    responses(
        (status = 200, description = "Active sessions", body = [SessionSummary]),
        (status = 401, description = "Missing or invalid access token", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "session"
)]
pub async fn get_sessions(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match sessions::list_sessions(&pool, principal.account_id).await {
        Ok(list) => Json(list).into_response(),
        Err(err) => {
            error!("Failed to list sessions: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}

/// Revoke a single session by id. Scoped to the caller's account.
#[utoipa::path(
    delete,
    path = "/v1/auth/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Session to revoke")),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 404, description = "No such session for this account", body = super::error::ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "session"
)]
pub async fn revoke_session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match sessions::delete_session_by_id(&pool, principal.account_id, session_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => AuthError::NotFound.into_response(),
        Err(err) => {
            error!("Failed to revoke session: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::AuthConfig;
    use super::*;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from("test-secret-which-is-long-enough"),
            "https://app.vestia.dev".to_string(),
        );
        Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter)))
    }

    #[tokio::test]
    async fn empty_refresh_token_is_rejected_before_the_store() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = refresh(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RefreshRequest {
                refresh_token: String::new(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_requires_a_bearer_token() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = logout(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn sessions_listing_requires_a_bearer_token() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = get_sessions(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
