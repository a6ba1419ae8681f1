//! Stable, machine-checkable error taxonomy for the auth surface.
//!
//! Every failure renders as `{"error": <kind>, "message": <text>}` with an
//! appropriate status code. Flow states (needs verification, needs 2FA) are
//! not errors and never pass through here. Anti-enumeration failures share a
//! single kind so callers cannot tell which precondition failed.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed input, rejected before any store access.
    InvalidRequest(String),
    DuplicateEmail,
    /// Merges account-not-found and wrong-password.
    InvalidCredentials,
    AccountSuspended,
    Invalid2FaToken,
    /// Used for both email-verification and reset-code mismatches.
    InvalidOrExpiredCode,
    InvalidRefreshToken,
    InvalidAccessToken,
    /// The operation does not apply to the account's current state.
    InvalidOperation,
    NotFound,
    RateLimited,
    /// Store/hash/signing failures; the real cause is logged internally.
    InternalFailure,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl AuthError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::DuplicateEmail => "duplicate_email",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountSuspended => "account_suspended",
            Self::Invalid2FaToken => "invalid_2fa_token",
            Self::InvalidOrExpiredCode => "invalid_or_expired_code",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::InvalidAccessToken => "invalid_access_token",
            Self::InvalidOperation => "invalid_operation",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::InternalFailure => "internal_failure",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidOrExpiredCode
            | Self::InvalidOperation => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::Invalid2FaToken
            | Self::InvalidRefreshToken
            | Self::InvalidAccessToken => StatusCode::UNAUTHORIZED,
            Self::AccountSuspended => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::InvalidRequest(message) => message.clone(),
            Self::DuplicateEmail => "An account with this email already exists".to_string(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::AccountSuspended => "This account has been suspended".to_string(),
            Self::Invalid2FaToken => "Invalid or expired 2FA token".to_string(),
            Self::InvalidOrExpiredCode => "Invalid or expired code".to_string(),
            Self::InvalidRefreshToken => "Invalid or expired refresh token".to_string(),
            Self::InvalidAccessToken => "Missing or invalid access token".to_string(),
            Self::InvalidOperation => "This operation is not available".to_string(),
            Self::NotFound => "Resource not found".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::InternalFailure => "Something went wrong".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_strings() {
        assert_eq!(AuthError::DuplicateEmail.kind(), "duplicate_email");
        assert_eq!(AuthError::InvalidCredentials.kind(), "invalid_credentials");
        assert_eq!(AuthError::AccountSuspended.kind(), "account_suspended");
        assert_eq!(AuthError::Invalid2FaToken.kind(), "invalid_2fa_token");
        assert_eq!(
            AuthError::InvalidOrExpiredCode.kind(),
            "invalid_or_expired_code"
        );
        assert_eq!(
            AuthError::InvalidRefreshToken.kind(),
            "invalid_refresh_token"
        );
        assert_eq!(AuthError::InternalFailure.kind(), "internal_failure");
    }

    #[test]
    fn status_codes_match_kinds() {
        assert_eq!(AuthError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::AccountSuspended.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::InvalidOrExpiredCode.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn response_body_carries_kind_and_message() {
        let response = AuthError::InvalidRequest("Password too short".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
