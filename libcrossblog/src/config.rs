//! Configuration management for Crossblog

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::oauth::{
    ClientCredentials, OAuthSettings, BLOGGER_SCOPE, DEFAULT_CALLBACK_PORT, GOOGLE_AUTH_URL,
    GOOGLE_TOKEN_URL,
};

/// Base URL of the Blogger v3 REST API.
pub const BLOGGER_API_BASE: &str = "https://www.googleapis.com/blogger/v3";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "CROSSBLOG_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub oauth: OAuthConfig,

    #[serde(default)]
    pub remote_blog: RemoteBlogConfig,

    /// Raw source entries, validated per entry by the registry
    #[serde(default)]
    pub sources: Vec<toml::Value>,

    /// Raw destination entries, validated per entry by the registry
    #[serde(default)]
    pub destinations: Vec<toml::Value>,
}

/// What the orchestrator does after a destination fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failed destination
    #[default]
    Halt,
    /// Push to every destination, then report all failures
    Continue,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl GoogleConfig {
    pub fn client_credentials(&self) -> ClientCredentials {
        ClientCredentials::new(self.client_id.clone(), self.client_secret.clone())
    }

    /// The stored refresh token, treating an empty string as absent
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| SecretString::from(t.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_callback_timeout_secs() -> u64 {
    300
}

fn default_auth_url() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_scope() -> String {
    BLOGGER_SCOPE.to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            callback_port: default_callback_port(),
            callback_timeout_secs: default_callback_timeout_secs(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scope: default_scope(),
        }
    }
}

impl OAuthConfig {
    pub fn to_settings(&self) -> OAuthSettings {
        OAuthSettings {
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            scope: self.scope.clone(),
            callback_port: self.callback_port,
            callback_timeout: Duration::from_secs(self.callback_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBlogConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Reuse a blog id looked up earlier in the same run
    #[serde(default)]
    pub cache_blog_id: bool,
}

fn default_api_base() -> String {
    BLOGGER_API_BASE.to_string()
}

impl Default for RemoteBlogConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            cache_blog_id: false,
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration with one example entry per kind and role
    pub fn default_config() -> Self {
        Self {
            sources: vec![
                entry(&[
                    ("name", "someblog"),
                    ("type", "remote-blog"),
                    ("blog_url", "https://example.com"),
                ]),
                entry(&[
                    ("name", "aBlogInMarkdown"),
                    ("type", "local-markdown"),
                    ("content_dir", "content"),
                ]),
            ],
            destinations: vec![
                entry(&[
                    ("name", "blog"),
                    ("type", "remote-blog"),
                    ("blog_url", "https://example.com"),
                ]),
                {
                    let mut e = string_table(&[
                        ("name", "otherblog"),
                        ("type", "local-markdown"),
                        ("content_dir", "content"),
                    ]);
                    e.insert("overwrite".to_string(), toml::Value::Boolean(false));
                    toml::Value::Table(e)
                },
            ],
            ..Default::default()
        }
    }

    /// Write the default configuration to `path`, creating parent directories
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(ConfigError::WriteError)?;
        }
        let content = toml::to_string_pretty(&Self::default_config())
            .map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::WriteError)?;
        info!(path = %path.display(), "Wrote default configuration");
        Ok(())
    }
}

fn string_table(fields: &[(&str, &str)]) -> toml::Table {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
        .collect()
}

fn entry(fields: &[(&str, &str)]) -> toml::Value {
    toml::Value::Table(string_table(fields))
}

/// Resolve the configuration file path
///
/// Order: explicit path, `CROSSBLOG_CONFIG`, `./config.toml` when present,
/// then `<config dir>/crossblog/config.toml`.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(shellexpand::tilde(path).to_string()));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let local = PathBuf::from("config.toml");
    if local.exists() {
        return Ok(local);
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crossblog").join("config.toml"))
}

/// Durable home of the long-lived refresh token
pub trait RefreshTokenStore: Send + Sync {
    fn save_refresh_token(&self, token: &SecretString) -> Result<()>;
}

/// Writes the refresh token back into the TOML config file
///
/// The file is re-read as a plain table so keys this version does not know
/// about survive the rewrite.
#[derive(Debug, Clone)]
pub struct ConfigFileTokenStore {
    path: PathBuf,
}

impl ConfigFileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RefreshTokenStore for ConfigFileTokenStore {
    fn save_refresh_token(&self, token: &SecretString) -> Result<()> {
        let content = std::fs::read_to_string(&self.path).map_err(ConfigError::ReadError)?;
        let mut table: toml::Table = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        let google = table
            .entry("google")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let google = google.as_table_mut().ok_or_else(|| ConfigError::InvalidField {
            field: "google".to_string(),
            reason: "expected a table".to_string(),
        })?;
        google.insert(
            "refresh_token".to_string(),
            toml::Value::String(token.expose_secret().to_string()),
        );

        let content = toml::to_string_pretty(&table).map_err(ConfigError::SerializeError)?;
        std::fs::write(&self.path, content).map_err(ConfigError::WriteError)?;
        info!(path = %self.path.display(), "Saved refresh token to configuration");
        Ok(())
    }
}

/// In-memory store, for tests and callers that persist elsewhere
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    saved: Mutex<Vec<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token saved so far, oldest first
    pub fn saved(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RefreshTokenStore for MemoryTokenStore {
    fn save_refresh_token(&self, token: &SecretString) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(token.expose_secret().to_string());
        Ok(())
    }
}
