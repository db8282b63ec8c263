//! OAuth credential broker.
//!
//! Produces access tokens for platforms that need delegated access, doing the
//! least work possible:
//!
//! - With a known refresh token: one `grant_type=refresh_token` exchange.
//! - Without one: bind the local [`callback`] listener, show the authorization
//!   URL, wait for the redirect, and exchange the code for an access + refresh
//!   token pair.
//!
//! The broker never writes configuration. A freshly issued refresh token is
//! handed back through [`TokenGrant::new_refresh_token`] and persisting it is
//! the caller's job.
//!
//! # Example
//!
//! ```ignore
//! use libcrossblog::oauth::{ClientCredentials, CredentialBroker, OAuthSettings};
//!
//! let broker = CredentialBroker::new(credentials, OAuthSettings::default());
//! let grant = broker.authorize(stored_refresh_token.as_ref()).await?;
//! if let Some(token) = grant.new_refresh_token() {
//!     store.save_refresh_token(token)?;
//! }
//! ```

pub mod callback;
mod error;

pub use callback::{redirect_uri, CallbackServer, DEFAULT_CALLBACK_PORT};
pub use error::OAuthError;

use base64::Engine;
use rand::Rng;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Google's authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope granting read/write access to Blogger.
pub const BLOGGER_SCOPE: &str = "https://www.googleapis.com/auth/blogger";

/// Default time the user has to finish the browser flow.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// OAuth client registration.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    fn ensure_present(&self) -> Result<(), OAuthError> {
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::Configuration("client id is not set".to_string()));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(OAuthError::Configuration(
                "client secret is not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Endpoints and listener settings for the authorization flow.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub auth_url: String,
    pub token_url: String,
    pub scope: String,
    pub callback_port: u16,
    pub callback_timeout: Duration,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scope: BLOGGER_SCOPE.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

/// Tokens produced by [`CredentialBroker::authorize`].
#[derive(Debug, Clone)]
pub struct TokenGrant {
    access_token: SecretString,
    refresh_token: SecretString,
    freshly_issued: bool,
}

impl TokenGrant {
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// The refresh token in use; the caller's own token when it was supplied.
    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    /// `Some` only when the interactive flow issued a new refresh token that
    /// must be persisted.
    pub fn new_refresh_token(&self) -> Option<&SecretString> {
        self.freshly_issued.then_some(&self.refresh_token)
    }
}

/// Successful token endpoint response.
#[derive(Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Generate a random `state` value for CSRF protection.
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Shows the authorization URL to the user during the interactive flow.
pub type AuthorizationPrompt = Arc<dyn Fn(&str) + Send + Sync>;

fn print_to_stderr(url: &str) {
    eprintln!("Open this URL in your browser to authorize access:\n\n  {}\n", url);
}

/// Acquires access tokens for one OAuth client.
pub struct CredentialBroker {
    http: Client,
    credentials: ClientCredentials,
    settings: OAuthSettings,
    prompt: AuthorizationPrompt,
}

impl CredentialBroker {
    pub fn new(credentials: ClientCredentials, settings: OAuthSettings) -> Self {
        Self::with_client(Client::new(), credentials, settings)
    }

    pub fn with_client(http: Client, credentials: ClientCredentials, settings: OAuthSettings) -> Self {
        Self {
            http,
            credentials,
            settings,
            prompt: Arc::new(print_to_stderr),
        }
    }

    /// Replace how the authorization URL is presented (default: stderr)
    pub fn with_prompt(mut self, prompt: AuthorizationPrompt) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Produce an access token, refreshing when possible and falling back to
    /// the interactive flow when no refresh token is known.
    pub async fn authorize(
        &self,
        refresh_token: Option<&SecretString>,
    ) -> Result<TokenGrant, OAuthError> {
        self.credentials.ensure_present()?;

        match refresh_token.filter(|t| !t.expose_secret().is_empty()) {
            Some(refresh_token) => {
                info!("Using provided refresh token");
                let response = self.refresh_access_token(refresh_token).await?;
                Ok(TokenGrant {
                    access_token: SecretString::from(response.access_token),
                    refresh_token: refresh_token.clone(),
                    freshly_issued: false,
                })
            }
            None => {
                warn!("No refresh token available, starting interactive authorization");
                self.authorize_interactively().await
            }
        }
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AccessTokenResponse, OAuthError> {
        self.token_request(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// Exchange an authorization code for an access + refresh token pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessTokenResponse, OAuthError> {
        self.token_request(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Build the URL the user visits to grant access.
    pub fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             prompt=consent&\
             state={}",
            self.settings.auth_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.settings.scope),
            urlencoding::encode(state),
        )
    }

    async fn authorize_interactively(&self) -> Result<TokenGrant, OAuthError> {
        let state = generate_state();
        let server = CallbackServer::bind(self.settings.callback_port, state.clone()).await?;
        let redirect = redirect_uri(server.port());
        let url = self.authorization_url(&state, &redirect);

        info!(url = %url, "Waiting for browser authorization");
        (self.prompt)(&url);

        let code = server.wait_for_code(self.settings.callback_timeout).await?;
        let response = self.exchange_code(&code, &redirect).await?;

        let refresh_token = response.refresh_token.ok_or_else(|| {
            OAuthError::Parse("Token response did not include a refresh token".to_string())
        })?;
        info!("Obtained new refresh token");

        Ok(TokenGrant {
            access_token: SecretString::from(response.access_token),
            refresh_token: SecretString::from(refresh_token),
            freshly_issued: true,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<AccessTokenResponse, OAuthError> {
        let response = self
            .http
            .post(&self.settings.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            // Only a 4xx with an OAuth error body is a rejection; 5xx is the endpoint failing
            if status.is_client_error() {
                if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&text) {
                    return Err(OAuthError::google(match err.error_description {
                        Some(description) => format!("{}: {}", err.error, description),
                        None => err.error,
                    }));
                }
            }
            return Err(OAuthError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<AccessTokenResponse>(&text)
            .map_err(|e| OAuthError::Parse(format!("Failed to parse token response: {}", e)))
    }
}
