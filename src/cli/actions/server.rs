use crate::api;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: String,
    pub token_issuer: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub code_ttl_seconds: i64,
    pub two_factor_exempt: Vec<String>,
    pub frontend_base_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(
        SecretString::from(args.token_secret),
        args.frontend_base_url,
    )
    .with_token_issuer(args.token_issuer)
    .with_access_ttl_seconds(args.access_ttl_seconds)
    .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
    .with_challenge_ttl_seconds(args.challenge_ttl_seconds)
    .with_code_ttl_seconds(args.code_ttl_seconds)
    .with_two_factor_exempt(args.two_factor_exempt);

    api::new(args.port, args.dsn, auth_config).await
}
