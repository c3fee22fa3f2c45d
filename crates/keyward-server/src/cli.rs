//! Command-line and environment settings
//!
//! Every flag falls back to an environment variable. Before parsing,
//! [`load_env_files`] reads `.env.<ENV>` and then `.env` from the working
//! directory. Variables already set in the process are never overridden, so
//! the precedence is: flag, process environment, `.env.<ENV>`, `.env`,
//! built-in default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use keyward_auth::{AuthConfig, ConfigError, GoogleConfig, VerifierKind};

use crate::logging::LogFormat;

/// Deployment environment used when `ENV` is unset
pub const DEFAULT_ENV: &str = "dev";

/// Load `.env.<ENV>` then `.env`, returning the files that were read
///
/// Missing files are skipped. Runs before logging is set up, so the caller
/// reports what was loaded.
pub fn load_env_files() -> Vec<PathBuf> {
    let env = std::env::var("ENV")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENV.to_string());

    [dotenvy::from_filename(format!(".env.{env}")), dotenvy::dotenv()]
        .into_iter()
        .filter_map(Result::ok)
        .collect()
}

/// keyward - Google sign-in and session service
#[derive(Parser, Debug, Clone)]
#[command(name = "keyward", version, about, long_about = None)]
pub struct Cli {
    /// Deployment environment name (selects `.env.<ENV>`)
    #[arg(long, env = "ENV", default_value = DEFAULT_ENV)]
    pub env: String,

    /// Address to bind
    #[arg(long, env = "SERVER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HMAC secret for access tokens (at least 32 bytes)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access-token lifetime in minutes
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = 15)]
    pub access_token_ttl: u64,

    /// Session lifetime in hours
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = 168)]
    pub refresh_token_ttl: u64,

    /// Issue a new refresh credential on every refresh and revoke the old one
    #[arg(long, env = "ROTATE_REFRESH_TOKENS")]
    pub rotate_refresh_tokens: bool,

    /// Deadline for each store or provider call, in seconds (0 disables)
    #[arg(long, env = "CALL_TIMEOUT", default_value_t = 10)]
    pub call_timeout: u64,

    /// Interval between expired-session sweeps, in seconds (0 disables)
    #[arg(long, env = "SESSION_REAP_INTERVAL", default_value_t = 3600)]
    pub session_reap_interval: u64,

    /// Google OAuth client id
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: String,

    /// Google OAuth client secret (authorization-code flow)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub google_client_secret: String,

    /// Redirect URL registered with Google (authorization-code flow)
    #[arg(long, env = "GOOGLE_REDIRECT_URL", default_value = "")]
    pub google_redirect_url: String,

    /// Credential accepted at login: `authorization_code` or `id_token`
    #[arg(long, env = "GOOGLE_VERIFIER", default_value_t = VerifierKind::AuthorizationCode)]
    pub google_verifier: VerifierKind,

    /// Clock skew tolerated on Google ID-token expiry, in seconds
    #[arg(long, env = "GOOGLE_ID_TOKEN_LEEWAY", default_value_t = 60)]
    pub google_id_token_leeway: u64,

    /// Postgres connection string; in-memory storage when unset
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum Postgres connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Log filter directive (overrides `RUST_LOG`), e.g. `debug` or `keyward_auth=trace`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Google client registration from the settings
    pub fn google_config(&self) -> GoogleConfig {
        GoogleConfig::new(
            self.google_client_id.clone(),
            self.google_client_secret.clone(),
            self.google_redirect_url.clone(),
        )
        .with_verifier(self.google_verifier)
        .with_id_token_leeway(Duration::from_secs(self.google_id_token_leeway))
    }

    /// Validated orchestrator configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the secret is too short, a TTL is out of
    /// range, or the Google settings are incomplete for the chosen verifier.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let access_ttl = self
            .access_token_ttl
            .checked_mul(60)
            .ok_or_else(|| ConfigError::invalid("ACCESS_TOKEN_TTL", "too large"))?;
        let refresh_ttl = self
            .refresh_token_ttl
            .checked_mul(60 * 60)
            .ok_or_else(|| ConfigError::invalid("REFRESH_TOKEN_TTL", "too large"))?;
        let call_timeout = (self.call_timeout > 0).then(|| Duration::from_secs(self.call_timeout));

        AuthConfig::builder(self.jwt_secret.clone(), self.google_config())
            .access_ttl(Duration::from_secs(access_ttl))
            .refresh_ttl(Duration::from_secs(refresh_ttl))
            .call_timeout(call_timeout)
            .rotate_refresh_tokens(self.rotate_refresh_tokens)
            .build()
    }

    /// Expired-session sweep interval, if enabled
    pub fn reap_interval(&self) -> Option<Duration> {
        (self.session_reap_interval > 0).then(|| Duration::from_secs(self.session_reap_interval))
    }
}
