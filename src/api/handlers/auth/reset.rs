//! Password reset: request, pre-check, and consume.
//!
//! The request endpoint never reveals whether an account exists. The
//! pre-check lets the UI validate a code before asking for a new password;
//! it does not consume the code. Only the reset itself does.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{self, EmailSender, OutboundEmail};

use super::codes::{check_code, generate_code};
use super::error::AuthError;
use super::password::{hash_password, MIN_PASSWORD_LEN};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage;
use super::types::{EmailRequest, MessageResponse, ResetPasswordRequest, VerifyResetCodeRequest};
use super::utils::{extract_client_ip, normalize_email, valid_email};

const RESET_REQUESTED: &str = "If that account exists, a reset code has been sent";

/// Request a reset code. The response is identical whether or not the
/// account exists.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Accepted", body = MessageResponse),
        (status = 429, description = "Rate limited", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<EmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::ForgotPassword)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_email(&email, RateLimitAction::ForgotPassword)
            == RateLimitDecision::Limited
    {
        return AuthError::RateLimited.into_response();
    }

    // A malformed address gets the same acknowledgement as an unknown one.
    if valid_email(&email) {
        if let Err(err) = issue_reset_code(&pool, &state, &sender, &email).await {
            error!("Failed to issue reset code: {err}");
        }
    }

    Json(MessageResponse {
        message: RESET_REQUESTED.to_string(),
    })
    .into_response()
}

async fn issue_reset_code(
    pool: &PgPool,
    state: &AuthState,
    sender: &Arc<dyn EmailSender>,
    email: &str,
) -> anyhow::Result<()> {
    let Some(account) = storage::lookup_account_by_email(pool, email).await? else {
        return Ok(());
    };

    let code = generate_code()?;
    let expires_at = Utc::now() + Duration::seconds(state.config().code_ttl_seconds());
    storage::set_reset_code(pool, account.id, &code, expires_at).await?;
    email::dispatch(
        sender.clone(),
        OutboundEmail::PasswordReset {
            email: account.email,
            code,
        },
    );
    Ok(())
}

/// Check a reset code without consuming it.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-reset-code",
    request_body = VerifyResetCodeRequest,
    responses(
        (status = 200, description = "Code is valid", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_reset_code(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyResetCodeRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    match reset_code_is_valid(&pool, &email, &request.code).await {
        Ok(true) => Json(MessageResponse {
            message: "Reset code is valid".to_string(),
        })
        .into_response(),
        Ok(false) => AuthError::InvalidOrExpiredCode.into_response(),
        Err(err) => {
            error!("Failed to verify reset code: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}

async fn reset_code_is_valid(pool: &PgPool, email: &str, code: &str) -> anyhow::Result<bool> {
    if !valid_email(email) {
        return Ok(false);
    }
    let Some(account) = storage::lookup_account_by_email(pool, email).await? else {
        return Ok(false);
    };
    Ok(check_code(
        account.reset_code.as_deref(),
        account.reset_expires_at,
        code,
        Utc::now(),
    ))
}

/// Consume a reset code and set a new password. Existing sessions stay
/// valid, matching logout semantics: revocation is an explicit action.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid code or weak password", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    if request.new_password.len() < MIN_PASSWORD_LEN {
        return AuthError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ))
        .into_response();
    }

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return AuthError::InvalidOrExpiredCode.into_response();
    }

    let account = match storage::lookup_account_by_email(&pool, &email).await {
        Ok(Some(account)) => account,
        Ok(None) => return AuthError::InvalidOrExpiredCode.into_response(),
        Err(err) => {
            error!("Failed to lookup account for reset: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    if !check_code(
        account.reset_code.as_deref(),
        account.reset_expires_at,
        &request.code,
        Utc::now(),
    ) {
        return AuthError::InvalidOrExpiredCode.into_response();
    }

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    // Consumes the code: the stored reset columns are cleared with the update.
    if let Err(err) = storage::update_password(&pool, account.id, &password_hash).await {
        error!("Failed to update password: {err}");
        return AuthError::InternalFailure.into_response();
    }

    Json(MessageResponse {
        message: "Password updated".to_string(),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn reset_password_rejects_a_short_password_first() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = reset_password(
            Extension(pool),
            Some(Json(ResetPasswordRequest {
                email: "alice@example.com".to_string(),
                code: "123456".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_a_malformed_email_as_a_bad_code() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = reset_password(
            Extension(pool),
            Some(Json(ResetPasswordRequest {
                email: "not-an-email".to_string(),
                code: "123456".to_string(),
                new_password: "long-enough-password".to_string(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn missing_payload_is_a_bad_request() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = verify_reset_code(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
