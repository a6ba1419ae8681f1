//! Second-factor verification, completing a paused login.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::codes::code_shape_ok;
use super::error::AuthError;
use super::sessions::open_session;
use super::state::AuthState;
use super::storage;
use super::tokens::decode_challenge_token;
use super::types::{AccountResponse, AuthenticatedResponse, LoginResponse, TwoFactorRequest};
use super::utils::extract_device;

/// Redeem a challenge token with a 6-digit code.
///
/// The challenge token is single-purpose: an access token presented here is
/// rejected. The code itself is a shape check only, a TOTP secret per account
/// is a planned follow-up.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/verify",
    request_body = TwoFactorRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid or expired challenge token", body = super::error::ErrorBody),
        (status = 400, description = "Malformed code", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_2fa(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::InvalidRequest("Missing payload".to_string()).into_response();
    };

    let claims = match decode_challenge_token(
        state.keys(),
        state.config().token_issuer(),
        &request.challenge_token,
    ) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    if !code_shape_ok(&request.code) {
        return AuthError::InvalidOrExpiredCode.into_response();
    }

    let Ok(account_id) = Uuid::parse_str(&claims.sub) else {
        return AuthError::Invalid2FaToken.into_response();
    };

    let account = match storage::lookup_account_by_id(&pool, account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => return AuthError::NotFound.into_response(),
        Err(err) => {
            error!("Failed to lookup account for 2fa: {err}");
            return AuthError::InternalFailure.into_response();
        }
    };

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
            error!("Failed to open session after 2fa: {err}");
            AuthError::InternalFailure.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::AuthConfig;
    use super::super::tokens::{ChallengeClaims, CHALLENGE_PURPOSE_2FA};
    use super::*;
    use axum::http::StatusCode;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    const SECRET: &str = "test-secret-which-is-long-enough";

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from(SECRET),
            "https://app.vestia.dev".to_string(),
        );
        Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter)))
    }

    fn signed_challenge_token(sub: &str) -> String {
        let now = usize::try_from(chrono::Utc::now().timestamp()).unwrap();
        let claims = ChallengeClaims {
            sub: sub.to_string(),
            purpose: CHALLENGE_PURPOSE_2FA.to_string(),
            iss: "vestia".to_string(),
            iat: now,
            exp: now + 300,
            jti: Uuid::new_v4().to_string(),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn garbage_challenge_token_is_rejected_before_the_store() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;
        let state = auth_state();

        let response = verify_2fa(
            HeaderMap::new(),
            Extension(pool),
            Extension(state),
            Some(Json(TwoFactorRequest {
                challenge_token: "not.a.jwt".to_string(),
                code: "123456".to_string(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn challenge_token_without_an_account_id_subject_is_rejected() -> anyhow::Result<()> {
        // Well-signed token, but the subject is not an account id. It must be
        // refused as a bad token, never reach the store.
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;
        let state = auth_state();

        let response = verify_2fa(
            HeaderMap::new(),
            Extension(pool),
            Extension(state),
            Some(Json(TwoFactorRequest {
                challenge_token: signed_challenge_token("not-an-account-id"),
                code: "123456".to_string(),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn missing_payload_is_a_bad_request() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://127.0.0.1/none")?;
        let state = auth_state();

        let response = verify_2fa(HeaderMap::new(), Extension(pool), Extension(state), None)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
