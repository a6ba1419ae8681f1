//! Token issuance and verification.
//!
//! Two families live here:
//!
//! - **Signed JWTs** (HS256): short-lived access tokens carrying identity
//!   claims, and very-short-lived 2FA challenge tokens carrying a `purpose`
//!   claim that every consumer must check. Neither is persisted; validity is
//!   signature + expiry (+ purpose).
//! - **Opaque refresh tokens**: 32 random bytes, base64url-encoded. The raw
//!   value only ever reaches the client; the sessions table stores a SHA-256
//!   hash used as the lookup key.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::AuthError;

pub(super) const CHALLENGE_PURPOSE_2FA: &str = "2fa";

/// HS256 key pair derived once from the configured token secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iss: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeClaims {
    pub sub: String,
    pub purpose: String,
    pub iss: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

pub(super) fn issue_access_token(
    keys: &TokenKeys,
    issuer: &str,
    ttl_seconds: i64,
    account_id: Uuid,
    email: &str,
    role: &str,
) -> Result<String> {
    let (iat, exp) = claim_window(ttl_seconds)?;
    let claims = AccessClaims {
        sub: account_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iss: issuer.to_string(),
        iat,
        exp,
        jti: Uuid::new_v4().to_string(),
    };
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .context("failed to sign access token")
}

pub(super) fn issue_challenge_token(
    keys: &TokenKeys,
    issuer: &str,
    ttl_seconds: i64,
    account_id: Uuid,
) -> Result<String> {
    let (iat, exp) = claim_window(ttl_seconds)?;
    let claims = ChallengeClaims {
        sub: account_id.to_string(),
        purpose: CHALLENGE_PURPOSE_2FA.to_string(),
        iss: issuer.to_string(),
        iat,
        exp,
        jti: Uuid::new_v4().to_string(),
    };
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .context("failed to sign challenge token")
}

/// Decode and validate an access token (signature, expiry, issuer).
pub(crate) fn decode_access_token(
    keys: &TokenKeys,
    issuer: &str,
    token: &str,
) -> Result<AccessClaims, AuthError> {
    let validation = validation(issuer);
    jsonwebtoken::decode::<AccessClaims>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidAccessToken)
}

/// Decode a challenge token and enforce its `purpose` claim.
///
/// A token minted for one purpose must be rejected by handlers expecting
/// another, so the purpose check is not optional here.
pub(super) fn decode_challenge_token(
    keys: &TokenKeys,
    issuer: &str,
    token: &str,
) -> Result<ChallengeClaims, AuthError> {
    let validation = validation(issuer);
    let claims = jsonwebtoken::decode::<ChallengeClaims>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::Invalid2FaToken)?;
    if claims.purpose != CHALLENGE_PURPOSE_2FA {
        return Err(AuthError::Invalid2FaToken);
    }
    Ok(claims)
}

/// Generate a new opaque refresh token.
/// The raw value is only returned to the client; the database stores a hash.
pub(super) fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a refresh token so raw values never touch the database.
pub(super) fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn validation(issuer: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(std::slice::from_ref(&issuer));
    validation.validate_exp = true;
    validation
}

fn claim_window(ttl_seconds: i64) -> Result<(usize, usize)> {
    let now = Utc::now().timestamp();
    let exp = now
        .checked_add(ttl_seconds)
        .ok_or_else(|| anyhow!("token expiry overflow"))?;
    Ok((to_usize(now, "iat")?, to_usize(exp, "exp")?))
}

fn to_usize(value: i64, label: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("jwt claim {label} does not fit into usize"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "vestia";

    fn keys() -> TokenKeys {
        TokenKeys::from_secret(b"test-secret-which-is-long-enough")
    }

    #[test]
    fn access_token_round_trips() {
        let keys = keys();
        let account_id = Uuid::new_v4();
        let token = issue_access_token(
            &keys,
            ISSUER,
            3600,
            account_id,
            "alice@example.com",
            "USER",
        )
        .unwrap();
        let claims = decode_access_token(&keys, ISSUER, &token).unwrap();
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, "USER");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let keys = keys();
        // Two minutes past expiry clears jsonwebtoken's default leeway.
        let token = issue_access_token(
            &keys,
            ISSUER,
            -120,
            Uuid::new_v4(),
            "alice@example.com",
            "USER",
        )
        .unwrap();
        assert_eq!(
            decode_access_token(&keys, ISSUER, &token),
            Err(AuthError::InvalidAccessToken)
        );
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let keys = keys();
        let token = issue_access_token(
            &keys,
            "someone-else",
            3600,
            Uuid::new_v4(),
            "alice@example.com",
            "USER",
        )
        .unwrap();
        assert_eq!(
            decode_access_token(&keys, ISSUER, &token),
            Err(AuthError::InvalidAccessToken)
        );
    }

    #[test]
    fn challenge_token_round_trips_with_purpose() {
        let keys = keys();
        let account_id = Uuid::new_v4();
        let token = issue_challenge_token(&keys, ISSUER, 300, account_id).unwrap();
        let claims = decode_challenge_token(&keys, ISSUER, &token).unwrap();
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.purpose, CHALLENGE_PURPOSE_2FA);
    }

    #[test]
    fn challenge_token_is_not_an_access_token() {
        // Purpose isolation: a 2FA challenge token must be rejected anywhere
        // an access token is expected (its claims do not even parse).
        let keys = keys();
        let token = issue_challenge_token(&keys, ISSUER, 300, Uuid::new_v4()).unwrap();
        assert_eq!(
            decode_access_token(&keys, ISSUER, &token),
            Err(AuthError::InvalidAccessToken)
        );
    }

    #[test]
    fn access_token_is_not_a_challenge_token() {
        let keys = keys();
        let token = issue_access_token(
            &keys,
            ISSUER,
            3600,
            Uuid::new_v4(),
            "alice@example.com",
            "USER",
        )
        .unwrap();
        assert_eq!(
            decode_challenge_token(&keys, ISSUER, &token),
            Err(AuthError::Invalid2FaToken)
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = keys();
        let token = issue_access_token(
            &keys,
            ISSUER,
            3600,
            Uuid::new_v4(),
            "alice@example.com",
            "USER",
        )
        .unwrap();
        let other = TokenKeys::from_secret(b"a-different-secret-entirely-here");
        assert_eq!(
            decode_access_token(&other, ISSUER, &token),
            Err(AuthError::InvalidAccessToken)
        );
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_stably() {
        let first = generate_refresh_token().unwrap();
        let second = generate_refresh_token().unwrap();
        assert_ne!(first, second);
        assert_eq!(hash_refresh_token(&first), hash_refresh_token(&first));
        assert_ne!(hash_refresh_token(&first), hash_refresh_token(&second));
        assert_eq!(hash_refresh_token(&first).len(), 32);
    }
}
