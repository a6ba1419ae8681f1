use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_flow_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("Secret used to sign access and challenge tokens")
                .env("VESTIA_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("token-issuer")
                .long("token-issuer")
                .help("Issuer claim for signed tokens")
                .env("VESTIA_TOKEN_ISSUER")
                .default_value("vestia"),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("VESTIA_ACCESS_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("VESTIA_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("challenge-ttl-seconds")
                .long("challenge-ttl-seconds")
                .help("2FA challenge token TTL in seconds")
                .env("VESTIA_CHALLENGE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_flow_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("code-ttl-seconds")
                .long("code-ttl-seconds")
                .help("Verification and reset code TTL in seconds")
                .env("VESTIA_CODE_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("two-factor-exempt")
                .long("two-factor-exempt")
                .help("Emails exempt from the second factor (comma separated)")
                .env("VESTIA_TWO_FACTOR_EXEMPT")
                .value_delimiter(',')
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, also the allowed CORS origin")
                .env("VESTIA_FRONTEND_BASE_URL")
                .default_value("https://app.vestia.dev"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub token_secret: String,
    pub token_issuer: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub code_ttl_seconds: i64,
    pub two_factor_exempt: Vec<String>,
    pub frontend_base_url: String,
}

impl Options {
    /// Collect auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --token-secret")?;
        let token_issuer = matches
            .get_one::<String>("token-issuer")
            .cloned()
            .unwrap_or_else(|| "vestia".to_string());
        let access_ttl_seconds = matches
            .get_one::<i64>("access-ttl-seconds")
            .copied()
            .unwrap_or(3600);
        let refresh_ttl_seconds = matches
            .get_one::<i64>("refresh-ttl-seconds")
            .copied()
            .unwrap_or(604_800);
        let challenge_ttl_seconds = matches
            .get_one::<i64>("challenge-ttl-seconds")
            .copied()
            .unwrap_or(300);
        let code_ttl_seconds = matches
            .get_one::<i64>("code-ttl-seconds")
            .copied()
            .unwrap_or(900);
        let two_factor_exempt = matches
            .get_many::<String>("two-factor-exempt")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let frontend_base_url = matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .unwrap_or_else(|| "https://app.vestia.dev".to_string());

        Ok(Self {
            token_secret,
            token_issuer,
            access_ttl_seconds,
            refresh_ttl_seconds,
            challenge_ttl_seconds,
            code_ttl_seconds,
            two_factor_exempt,
            frontend_base_url,
        })
    }
}
