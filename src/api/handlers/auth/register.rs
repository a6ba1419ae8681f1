//! Account registration.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{self, EmailSender, OutboundEmail};
use crate::api::notify;

use super::codes::generate_code;
use super::error::AuthError;
use super::password::{hash_password, MIN_PASSWORD_LEN};
use super::state::AuthState;
use super::storage::{self, InsertOutcome, NewAccount};
use super::types::{AccountResponse, RegisterRequest};
use super::utils::{generate_referral_code, normalize_email, valid_email};

/// Create an account and issue the initial email-verification code.
///
/// No tokens are issued here; the caller must verify the address or log in
/// separately. The verification email and the welcome notification are both
/// best-effort and never abort the registration.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, email unverified", body = AccountResponse),
        (status = 400, description = "Malformed input", body = super::error::ErrorBody),
        (status = 409, description = "Email already registered", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    // Validation happens before any store access.
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return AuthError::InvalidRequest("Invalid email address".to_string()).into_response();
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return AuthError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ))
        .into_response();
    }
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return AuthError::InvalidRequest("First and last name are required".to_string())
            .into_response();
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    // An unknown referral code is silently ignored, not an error.
    let referred_by = match &request.referral_code {
        Some(code) if !code.trim().is_empty() => {
            match storage::lookup_referrer_id(&pool, code.trim()).await {
                Ok(referrer) => referrer,
                Err(err) => {
                    error!("Failed to resolve referral code: {err}");
                    return AuthError::InternalFailure.into_response();
                }
            }
        }
        _ => None,
    };

    let (referral_code, verification_code) =
        match (generate_referral_code(), generate_code()) {
            (Ok(referral), Ok(code)) => (referral, code),
            (Err(err), _) | (_, Err(err)) => {
                error!("Failed to generate account codes: {err}");
                return AuthError::InternalFailure.into_response();
            }
        };

    let new_account = NewAccount {
        email: email.clone(),
        password_hash,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone: request.phone.clone(),
        country: request.country.clone(),
        referral_code,
        referred_by,
        verification_code: verification_code.clone(),
        verification_expires_at: Utc::now()
            + Duration::seconds(state.config().code_ttl_seconds()),
    };

    let account = match storage::insert_account(&pool, &new_account).await {
        Ok(InsertOutcome::Created(account)) => account,
        Ok(InsertOutcome::DuplicateEmail) => {
            return AuthError::DuplicateEmail.into_response();
        }
        Err(err) => {
            error!("Failed to insert account: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

    notify::best_effort(
        &pool,
        account.id,
        "Welcome to Vestia",
        "Your account has been created. Verify your email to start investing.",
        "account",
    )
    .await;

    email::dispatch(
        sender.0.clone(),
        OutboundEmail::Verification {
            email: email.clone(),
            code: verification_code,
        },
    );

    (StatusCode::CREATED, Json(AccountResponse::from(&*account))).into_response()
}
