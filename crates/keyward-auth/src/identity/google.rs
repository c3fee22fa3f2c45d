//! Google authorization-code verifier
//!
//! Exchanges the code at the token endpoint, then reads the OpenID Connect
//! userinfo endpoint with the resulting access token.

use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl,
    RequestTokenError, TokenResponse, TokenUrl,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{GOOGLE_PROVIDER, IdentityVerifier, require_verified_email};
use crate::config::GoogleConfig;
use crate::error::IdentityError;
use crate::types::VerifiedIdentity;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Userinfo response
///
/// Accepts both the OIDC (`sub`, `email_verified`) and the legacy v2
/// (`id`, `verified_email`) field names.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    #[serde(alias = "id")]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "verified_email")]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

/// Verifies Google authorization codes
#[derive(Debug, Clone)]
pub struct GoogleCodeVerifier {
    client: GoogleClient,
    userinfo_url: String,
    http_client: reqwest::Client,
}

impl GoogleCodeVerifier {
    /// Verifier for the client registration in `config`
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Configuration` if an endpoint or the redirect
    /// URL cannot be parsed, or the HTTP client cannot be built.
    pub fn new(config: &GoogleConfig) -> Result<Self, IdentityError> {
        let invalid = |what: &str, e: url::ParseError| {
            IdentityError::Configuration(format!("invalid {what}: {e}"))
        };

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().to_string(),
            ))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone()).map_err(|e| invalid("auth URL", e))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token URL", e))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| invalid("redirect URL", e))?,
            );

        // No redirects: the token endpoint must answer directly
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            userinfo_url: config.userinfo_url.clone(),
            http_client,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => {
                    IdentityError::CodeExchange(resp.to_string())
                }
                RequestTokenError::Request(e) => IdentityError::Transport(e.to_string()),
                RequestTokenError::Parse(e, _) => IdentityError::MalformedResponse(e.to_string()),
                RequestTokenError::Other(msg) => IdentityError::CodeExchange(msg),
            })?;

        Ok(token.access_token().secret().clone())
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleUserInfo, IdentityError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Status {
                endpoint: "userinfo",
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<GoogleUserInfo>().await?)
    }
}

#[async_trait]
impl IdentityVerifier for GoogleCodeVerifier {
    fn provider(&self) -> &'static str {
        GOOGLE_PROVIDER
    }

    fn credential_param(&self) -> &'static str {
        "code"
    }

    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, IdentityError> {
        let access_token = self.exchange_code(credential).await.inspect_err(|e| {
            warn!(error = %e, "Google code exchange failed");
        })?;

        let info = self.fetch_userinfo(&access_token).await.inspect_err(|e| {
            warn!(error = %e, "Google userinfo request failed");
        })?;

        debug!(subject = %info.sub, "Google userinfo received");
        require_verified_email(
            info.sub,
            info.email,
            info.email_verified.unwrap_or(false),
            info.name,
        )
    }
}
