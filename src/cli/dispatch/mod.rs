//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: auth_opts.token_secret,
        token_issuer: auth_opts.token_issuer,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        challenge_ttl_seconds: auth_opts.challenge_ttl_seconds,
        code_ttl_seconds: auth_opts.code_ttl_seconds,
        two_factor_exempt: auth_opts.two_factor_exempt,
        frontend_base_url: auth_opts.frontend_base_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("VESTIA_DSN", Some("postgres://user@localhost:5432/vestia")),
                ("VESTIA_TOKEN_SECRET", Some("a-token-secret-for-tests")),
                ("VESTIA_TWO_FACTOR_EXEMPT", Some("demo@vestia.dev,qa@vestia.dev")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["vestia"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/vestia");
                    assert_eq!(args.token_secret, "a-token-secret-for-tests");
                    assert_eq!(args.token_issuer, "vestia");
                    assert_eq!(args.access_ttl_seconds, 3600);
                    assert_eq!(
                        args.two_factor_exempt,
                        vec!["demo@vestia.dev".to_string(), "qa@vestia.dev".to_string()]
                    );
                }
            },
        );
    }

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("VESTIA_DSN", Some("postgres://user@localhost:5432/vestia")),
                ("VESTIA_TOKEN_SECRET", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["vestia"]);
                assert!(result.is_err());
            },
        );
    }
}
