//! Sync orchestration
//!
//! One run pulls a single post from a named source and pushes it to each named
//! destination in the order given. Destinations run sequentially: a failure
//! either halts the run or is collected for the final report, depending on
//! [`FailurePolicy`]. Credentials are acquired per platform call because
//! access tokens are short-lived.

use secrecy::SecretString;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, FailurePolicy, RefreshTokenStore};
use crate::error::{CrossblogError, ErrorKind, PlatformError, Result};
use crate::oauth::CredentialBroker;
use crate::platforms::registry::Registry;
use crate::platforms::remote_blog::RemoteBlog;
use crate::platforms::{Destination, Source};
use crate::types::{PlatformKind, PlatformOptions, Post, PushOutcome};

/// Which post to move, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub source: String,
    /// Post URL for remote blogs, file path for local markdown
    pub locator: String,
    pub destinations: Vec<String>,
}

impl SyncRequest {
    pub fn new(
        source: impl Into<String>,
        locator: impl Into<String>,
        destinations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            source: source.into(),
            locator: locator.into(),
            destinations: destinations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationStatus {
    Published { location: String },
    Skipped { location: String, reason: String },
    /// Credentials were prepared but nothing was written
    DryRun,
    /// The destination kind cannot be pushed to
    Unsupported,
    Failed { message: String },
}

impl DestinationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, DestinationStatus::Failed { .. })
    }
}

impl std::fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationStatus::Published { location } => write!(f, "published {}", location),
            DestinationStatus::Skipped { location, reason } => {
                write!(f, "skipped {} ({})", location, reason)
            }
            DestinationStatus::DryRun => write!(f, "dry run, not written"),
            DestinationStatus::Unsupported => write!(f, "unsupported, push not available"),
            DestinationStatus::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationOutcome {
    pub name: String,
    pub kind: PlatformKind,
    pub status: DestinationStatus,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub post: Post,
    pub destinations: Vec<DestinationOutcome>,
}

impl SyncReport {
    pub fn failures(&self) -> Vec<&DestinationOutcome> {
        self.destinations
            .iter()
            .filter(|d| d.status.is_failure())
            .collect()
    }
}

/// Access token and blog id for one remote blog call
#[derive(Debug, Clone)]
pub struct PreparedCredentials {
    pub access_token: SecretString,
    pub blog_id: String,
}

/// Drives pull, credentialing and push for one run
pub struct SyncOrchestrator {
    registry: Registry,
    broker: CredentialBroker,
    token_store: Arc<dyn RefreshTokenStore>,
    refresh_token: Option<SecretString>,
    sources: Vec<toml::Value>,
    destinations: Vec<toml::Value>,
    dry_run: bool,
    failure_policy: FailurePolicy,
    cache_blog_id: bool,
    blog_ids: HashMap<String, String>,
    last_report: Option<SyncReport>,
}

impl SyncOrchestrator {
    pub fn new(config: &Config, token_store: Arc<dyn RefreshTokenStore>) -> Self {
        Self {
            registry: Registry::new(config),
            broker: CredentialBroker::new(
                config.google.client_credentials(),
                config.oauth.to_settings(),
            ),
            token_store,
            refresh_token: config.google.refresh_token(),
            sources: config.sources.clone(),
            destinations: config.destinations.clone(),
            dry_run: config.dry_run,
            failure_policy: config.failure_policy,
            cache_blog_id: config.remote_blog.cache_blog_id,
            blog_ids: HashMap::new(),
            last_report: None,
        }
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_broker(mut self, broker: CredentialBroker) -> Self {
        self.broker = broker;
        self
    }

    /// Report of the most recent run, including runs that ended in
    /// `PartialFailure`
    pub fn last_report(&self) -> Option<&SyncReport> {
        self.last_report.as_ref()
    }

    /// Resolve the named platforms from configuration and sync
    pub async fn run(&mut self, request: &SyncRequest) -> Result<SyncReport> {
        info!(
            source = %request.source,
            locator = %request.locator,
            destinations = ?request.destinations,
            dry_run = self.dry_run,
            "Starting sync"
        );

        let (sources, destinations) = self.registry.load(
            &self.sources,
            &self.destinations,
            std::slice::from_ref(&request.source),
            &request.destinations,
        )?;

        let source = sources
            .into_iter()
            .find(|s| s.name() == request.source)
            .ok_or_else(|| {
                CrossblogError::NotFound(format!("source '{}' was not loaded", request.source))
            })?;

        self.sync(source.as_ref(), &request.locator, &destinations)
            .await
    }

    /// Pull from `source` and push to every destination, in order
    pub async fn sync(
        &mut self,
        source: &dyn Source,
        locator: &str,
        destinations: &[Box<dyn Destination>],
    ) -> Result<SyncReport> {
        self.last_report = None;
        let post = self.pull(source, locator).await?;

        let mut outcomes = Vec::with_capacity(destinations.len());
        let mut failed = Vec::new();

        for destination in destinations {
            let name = destination.name().to_string();
            let kind = destination.kind();

            let status = match self.push(destination.as_ref(), &post).await {
                Ok(status) => status,
                Err(e) if e.kind() == ErrorKind::Unsupported => {
                    error!(destination = %name, kind = %kind, error = %e, "Destination does not support push, skipping");
                    DestinationStatus::Unsupported
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::Halt => {
                        error!(destination = %name, error = %e, "Push failed, halting");
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        error!(destination = %name, error = %e, "Push failed, continuing");
                        failed.push(name.clone());
                        DestinationStatus::Failed {
                            message: e.to_string(),
                        }
                    }
                },
            };

            info!(destination = %name, status = %status, "Destination done");
            outcomes.push(DestinationOutcome { name, kind, status });
        }

        let report = SyncReport {
            post,
            destinations: outcomes,
        };
        self.last_report = Some(report.clone());

        if !failed.is_empty() {
            return Err(CrossblogError::PartialFailure(failed));
        }
        Ok(report)
    }

    async fn pull(&mut self, source: &dyn Source, locator: &str) -> Result<Post> {
        let name = source.name().to_string();
        let step = format!("pull from source '{}'", name);
        info!(source = %name, kind = %source.kind(), "Pulling post");

        if !source.supports_pull() {
            return Err(CrossblogError::from(PlatformError::NotImplemented(format!(
                "source '{}' does not support pull",
                name
            )))
            .in_step(step));
        }

        let options = self
            .source_options(source, locator)
            .await
            .map_err(|e| e.in_step(format!("credentials for '{}'", name)))?;

        let post = source.pull(&options).await.map_err(|e| e.in_step(&step))?;

        if post.markdown.trim().is_empty() {
            return Err(CrossblogError::from(PlatformError::Conversion(
                "source returned an empty markdown body".to_string(),
            ))
            .in_step(step));
        }

        info!(title = %post.title, canonical_url = %post.canonical_url, "Pulled post");
        Ok(post)
    }

    async fn push(&mut self, destination: &dyn Destination, post: &Post) -> Result<DestinationStatus> {
        let name = destination.name().to_string();
        let step = format!("push to destination '{}'", name);

        if !destination.supports_push() {
            return Err(CrossblogError::from(PlatformError::NotImplemented(format!(
                "{} destinations cannot be pushed to",
                destination.kind()
            )))
            .in_step(step));
        }

        let options = self
            .destination_options(destination)
            .await
            .map_err(|e| e.in_step(format!("credentials for '{}'", name)))?;

        if self.dry_run {
            info!(destination = %name, "Dry run, skipping push");
            return Ok(DestinationStatus::DryRun);
        }

        debug!(destination = %name, title = %post.title, "Pushing post");
        match destination.push(post, &options).await {
            Ok(PushOutcome::Published { location }) => Ok(DestinationStatus::Published { location }),
            Ok(PushOutcome::Skipped { location, reason }) => {
                warn!(destination = %name, location = %location, reason = %reason, "Push skipped");
                Ok(DestinationStatus::Skipped { location, reason })
            }
            Err(CrossblogError::Platform(PlatformError::AlreadyExists(location))) => {
                warn!(destination = %name, location = %location, "Target already exists");
                Ok(DestinationStatus::Skipped {
                    location,
                    reason: "already exists".to_string(),
                })
            }
            Err(e) => Err(e.in_step(step)),
        }
    }

    async fn source_options(&mut self, source: &dyn Source, locator: &str) -> Result<PlatformOptions> {
        if !source.kind().requires_credentials() {
            return Ok(PlatformOptions {
                file_path: Some(PathBuf::from(locator)),
                ..Default::default()
            });
        }

        let credentials = self.prepare_credentials(Some(source), None).await?;
        Ok(PlatformOptions {
            access_token: Some(credentials.access_token),
            blog_id: credentials.blog_id,
            post_url: locator.to_string(),
            file_path: None,
        })
    }

    async fn destination_options(&mut self, destination: &dyn Destination) -> Result<PlatformOptions> {
        if !destination.kind().requires_credentials() {
            return Ok(PlatformOptions::default());
        }

        let credentials = self.prepare_credentials(None, Some(destination)).await?;
        Ok(PlatformOptions {
            access_token: Some(credentials.access_token),
            blog_id: credentials.blog_id,
            ..Default::default()
        })
    }

    /// Obtain an access token and blog id for exactly one remote blog
    ///
    /// Exactly one of `source` / `destination` must be given. A refresh token
    /// issued by the interactive flow is persisted through the token store
    /// before this returns.
    pub async fn prepare_credentials(
        &mut self,
        source: Option<&dyn Source>,
        destination: Option<&dyn Destination>,
    ) -> Result<PreparedCredentials> {
        let blog = match (source, destination) {
            (Some(_), Some(_)) => {
                return Err(CrossblogError::InvalidInput(
                    "both a source and a destination were passed".to_string(),
                ))
            }
            (None, None) => {
                return Err(CrossblogError::InvalidInput(
                    "neither a source nor a destination was passed".to_string(),
                ))
            }
            (Some(source), None) => source.as_remote_blog().ok_or_else(|| {
                CrossblogError::InvalidInput(format!(
                    "source '{}' is not a remote blog",
                    source.name()
                ))
            })?,
            (None, Some(destination)) => destination.as_remote_blog().ok_or_else(|| {
                CrossblogError::InvalidInput(format!(
                    "destination '{}' is not a remote blog",
                    destination.name()
                ))
            })?,
        };

        let grant = self.broker.authorize(self.refresh_token.as_ref()).await?;

        if let Some(token) = grant.new_refresh_token() {
            info!("Writing refresh token to configuration");
            self.token_store.save_refresh_token(token)?;
            self.refresh_token = Some(token.clone());
        }

        let blog_id = self.blog_id(blog, grant.access_token()).await?;

        Ok(PreparedCredentials {
            access_token: grant.access_token().clone(),
            blog_id,
        })
    }

    async fn blog_id(&mut self, blog: &RemoteBlog, access_token: &SecretString) -> Result<String> {
        if self.cache_blog_id {
            if let Some(id) = self.blog_ids.get(blog.blog_url()) {
                debug!(blog = %blog.name(), "Using cached blog id");
                return Ok(id.clone());
            }
        }

        let id = blog.get_blog_id(access_token).await?;
        if self.cache_blog_id {
            self.blog_ids.insert(blog.blog_url().to_string(), id.clone());
        }
        Ok(id)
    }
}
