//! Email verification: code issuance and redemption.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{self, EmailSender, OutboundEmail};
use crate::api::notify;

use super::codes::{check_code, generate_code};
use super::error::AuthError;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::sessions::open_session;
use super::state::AuthState;
use super::storage;
use super::types::{
    AccountResponse, AuthenticatedResponse, EmailRequest, LoginResponse, MessageResponse,
    VerifyEmailRequest,
};
use super::utils::{extract_client_ip, extract_device, normalize_email, valid_email};

/// Issue (or reissue) a verification code. A new code overwrites any
/// outstanding one, invalidating it.
#[utoipa::path(
    post,
    path = "/v1/auth/send-verification",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Unknown account or already verified", body = super::error::ErrorBody),
        (status = 429, description = "Rate limited", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn send_verification(
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
    if !valid_email(&email) {
        return AuthError::InvalidRequest("Invalid email address".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::SendVerification)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_email(&email, RateLimitAction::SendVerification)
            == RateLimitDecision::Limited
    {
        return AuthError::RateLimited.into_response();
    }

    let account = match storage::lookup_account_by_email(&pool, &email).await {
        Ok(Some(account)) => account,
        Ok(None) => return AuthError::InvalidOperation.into_response(),
        Err(err) => {
            error!("Failed to lookup account for verification: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    if account.email_verified {
        return AuthError::InvalidOperation.into_response();
    }

    let code = match generate_code() {
        Ok(code) => code,
        Err(err) => {
            error!("Failed to generate verification code: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };
    let expires_at = Utc::now() + Duration::seconds(state.config().code_ttl_seconds());
    if let Err(err) = storage::set_verification_code(&pool, account.id, &code, expires_at).await {
        error!("Failed to store verification code: {err}");
        return AuthError::InternalFailure.into_response();
    }

    email::dispatch(
        sender.0.clone(),
        OutboundEmail::Verification {
            email: account.email,
            code,
        },
    );

    Json(MessageResponse {
        message: "Verification code sent".to_string(),
    })
    .into_response()
}

/// Redeem a verification code. Success marks the email verified and logs
/// the caller in, the expected next step after registration.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Verified and authenticated", body = LoginResponse),
        (status = 400, description = "Invalid or expired code", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return AuthError::InvalidOrExpiredCode.into_response();
    }

    let account = match storage::lookup_account_by_email(&pool, &email).await {
        Ok(Some(account)) => account,
        Ok(None) => return AuthError::InvalidOrExpiredCode.into_response(),
        Err(err) => {
            error!("Failed to lookup account for verification: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    if account.email_verified {
        return AuthError::InvalidOperation.into_response();
    }

    if !check_code(
        account.verification_code.as_deref(),
        account.verification_expires_at,
        &request.code,
        Utc::now(),
    ) {
        return AuthError::InvalidOrExpiredCode.into_response();
    }

    if let Err(err) = storage::mark_email_verified(&pool, account.id).await {
        error!("Failed to mark email verified: {err}");
        return AuthError::InternalFailure.into_response();
    }

    notify::best_effort(
        &pool,
        account.id,
        "Email verified",
        "Your email address has been verified. Welcome aboard!",
        "account",
    )
    .await;

    let device = extract_device(&headers);
    match open_session(&pool, &state, &account, device).await {
        Ok((access_token, refresh_token)) => {
            let mut verified = AccountResponse::from(&account);
            verified.email_verified = true;
            Json(LoginResponse::Authenticated(AuthenticatedResponse {
                account: verified,
                access_token,
                refresh_token,
            }))
            .into_response()
        }
        Err(err) => {
            error!("Failed to open session after verification: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::AuthConfig;
    use super::*;
    use crate::api::email::LogEmailSender;
    use axum::http::StatusCode;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from("test-secret-which-is-long-enough"),
            "https://app.vestia.dev".to_string(),
        );
        Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter)))
    }

    fn sender() -> Arc<dyn EmailSender> {
        Arc::new(LogEmailSender)
    }

    #[tokio::test]
    async fn send_verification_rejects_a_malformed_email() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = send_verification(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Extension(sender()),
            Some(Json(EmailRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_rejects_a_malformed_email_as_a_bad_code() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;

        let response = verify_email(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(VerifyEmailRequest {
                email: "not-an-email".to_string(),
                code: "123456".to_string(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
