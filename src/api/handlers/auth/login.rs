//! Password login and its decision procedure.
//!
//! The ordered checks live in [`decide`], a pure function over the fetched
//! account row, so the state machine is testable without a database. The
//! handler performs the side effects each branch asks for.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{self, EmailSender, OutboundEmail};

use super::codes::generate_code;
use super::error::AuthError;
use super::password::verify_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::sessions::open_session;
use super::state::AuthState;
use super::storage::{self, AccountRecord, STATUS_SUSPENDED};
use super::tokens::issue_challenge_token;
use super::types::{AccountResponse, AuthenticatedResponse, LoginRequest, LoginResponse};
use super::utils::{extract_client_ip, extract_device, normalize_email, valid_email};

/// Outcome of the ordered login checks.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum LoginDecision {
    Reject(AuthError),
    /// Authentication paused until the email is verified. `mint_code` is set
    /// when no unexpired code is outstanding and a fresh one must be issued.
    NeedsVerification { mint_code: bool },
    NeedsChallenge,
    Authenticated,
}

/// Evaluate the login state machine for a found account.
///
/// Order matters: suspension is reported before the password check
/// (suspension is not a secret), and an unverified email blocks
/// authentication even with valid credentials.
pub(super) fn decide(
    account: &AccountRecord,
    password_ok: bool,
    exempt_from_2fa: bool,
    now: DateTime<Utc>,
) -> LoginDecision {
    if account.status == STATUS_SUSPENDED {
        return LoginDecision::Reject(AuthError::AccountSuspended);
    }
    if !password_ok {
        return LoginDecision::Reject(AuthError::InvalidCredentials);
    }
    if !account.email_verified {
        let has_live_code = match (
            account.verification_code.as_deref(),
            account.verification_expires_at,
        ) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        };
        return LoginDecision::NeedsVerification {
            mint_code: !has_live_code,
        };
    }
    if account.two_factor_enabled && !exempt_from_2fa {
        return LoginDecision::NeedsChallenge;
    }
    LoginDecision::Authenticated
}

/// Authenticate with email + password.
///
/// Terminates in one of three success-shaped states or an error. An unknown
/// email and a wrong password are indistinguishable (`invalid_credentials`).
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, or a flow state the client must resolve", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = super::error::ErrorBody),
        (status = 403, description = "Account suspended", body = super::error::ErrorBody),
        (status = 429, description = "Rate limited", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // A malformed address can never match an account.
        return AuthError::InvalidCredentials.into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Login)
            == RateLimitDecision::Limited
    {
        return AuthError::RateLimited.into_response();
    }

    let account = match storage::lookup_account_by_email(&pool, &email).await {
        Ok(Some(account)) => account,
        Ok(None) => return AuthError::InvalidCredentials.into_response(),
        Err(err) => {
            error!("Failed to lookup account for login: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    let password_ok = verify_password(&request.password, &account.password_hash);
    let exempt = state.is_two_factor_exempt(&email);

    match decide(&account, password_ok, exempt, Utc::now()) {
        LoginDecision::Reject(err) => err.into_response(),
        LoginDecision::NeedsVerification { mint_code } => {
            if mint_code {
                if let Err(err) =
                    mint_verification_code(&pool, &state, &sender, &account).await
                {
                    error!("Failed to issue verification code: {err}");
                    return AuthError::InternalFailure.into_response();
                }
            }
            Json(LoginResponse::NeedsEmailVerification { email }).into_response()
        }
        LoginDecision::NeedsChallenge => {
            let challenge_token = match issue_challenge_token(
                state.keys(),
                state.config().token_issuer(),
                state.config().challenge_ttl_seconds(),
                account.id,
            ) {
                Ok(token) => token,
                Err(err) => {
                    error!("Failed to issue challenge token: {err}");
                    return AuthError::InternalFailure.into_response();
                }
            };
            Json(LoginResponse::Needs2Fa { challenge_token }).into_response()
        }
        LoginDecision::Authenticated => {
            let device = extract_device(&headers);
            match open_session(&pool, &state, &account, device).await {
                Ok((access_token, refresh_token)) => {
                    Json(LoginResponse::Authenticated(AuthenticatedResponse {
                        account: AccountResponse::from(&account),
                        access_token,
                        refresh_token,
                    }))
                    .into_response()
                }
                Err(err) => {
                    error!("Failed to open session: {err}");
                    AuthError::InternalFailure.into_response()
                }
            }
        }
    }
}

/// Issue a fresh verification code and dispatch it, fire-and-forget.
async fn mint_verification_code(
    pool: &PgPool,
    state: &AuthState,
    sender: &Arc<dyn EmailSender>,
    account: &AccountRecord,
) -> anyhow::Result<()> {
    let code = generate_code()?;
    let expires_at = Utc::now() + Duration::seconds(state.config().code_ttl_seconds());
    storage::set_verification_code(pool, account.id, &code, expires_at).await?;
    email::dispatch(
        sender.clone(),
        OutboundEmail::Verification {
            email: account.email.clone(),
            code,
        },
    );
    Ok(())
}
