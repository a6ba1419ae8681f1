//! Auth state and configuration.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use super::tokens::TokenKeys;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_CODE_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_TOKEN_ISSUER: &str = "vestia";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    token_issuer: String,
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    challenge_ttl_seconds: i64,
    code_ttl_seconds: i64,
    // Accounts exempt from the second factor (demo accounts), normalized
    // lowercase. Configuration-driven, never a hardcoded literal.
    two_factor_exempt: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            token_secret,
            token_issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            two_factor_exempt: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_token_issuer(mut self, issuer: String) -> Self {
        self.token_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: i64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_two_factor_exempt(mut self, emails: Vec<String>) -> Self {
        self.two_factor_exempt = emails
            .into_iter()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        self
    }

    pub(crate) fn token_issuer(&self) -> &str {
        &self.token_issuer
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub(super) fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    pub(super) fn challenge_ttl_seconds(&self) -> i64 {
        self.challenge_ttl_seconds
    }

    pub(super) fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }

    fn token_secret_bytes(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }
}

pub struct AuthState {
    config: AuthConfig,
    keys: TokenKeys,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let keys = TokenKeys::from_secret(config.token_secret_bytes());
        Self {
            config,
            keys,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    /// True when the (normalized) email skips the second factor.
    pub(super) fn is_two_factor_exempt(&self, email_normalized: &str) -> bool {
        self.config
            .two_factor_exempt
            .iter()
            .any(|exempt| exempt == email_normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("test-secret-which-is-long-enough"),
            "https://app.vestia.dev".to_string(),
        )
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = config();
        assert_eq!(config.token_issuer(), DEFAULT_TOKEN_ISSUER);
        assert_eq!(config.access_ttl_seconds(), DEFAULT_ACCESS_TTL_SECONDS);
        assert_eq!(config.refresh_ttl_seconds(), DEFAULT_REFRESH_TTL_SECONDS);
        assert_eq!(
            config.challenge_ttl_seconds(),
            DEFAULT_CHALLENGE_TTL_SECONDS
        );
        assert_eq!(config.code_ttl_seconds(), DEFAULT_CODE_TTL_SECONDS);

        let config = config
            .with_token_issuer("vestia-test".to_string())
            .with_access_ttl_seconds(120)
            .with_refresh_ttl_seconds(3600)
            .with_challenge_ttl_seconds(60)
            .with_code_ttl_seconds(300);
        assert_eq!(config.token_issuer(), "vestia-test");
        assert_eq!(config.access_ttl_seconds(), 120);
        assert_eq!(config.refresh_ttl_seconds(), 3600);
        assert_eq!(config.challenge_ttl_seconds(), 60);
        assert_eq!(config.code_ttl_seconds(), 300);
    }

    #[test]
    fn two_factor_exemption_is_normalized() {
        let config = config().with_two_factor_exempt(vec![
            " Demo@Vestia.dev ".to_string(),
            String::new(),
        ]);
        let state = AuthState::new(config, Arc::new(NoopRateLimiter));
        assert!(state.is_two_factor_exempt("demo@vestia.dev"));
        assert!(!state.is_two_factor_exempt("alice@example.com"));
        assert!(!state.is_two_factor_exempt(""));
    }
}
