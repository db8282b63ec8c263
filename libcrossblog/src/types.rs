//! Core types for Crossblog

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// A post normalized for transfer between platforms
///
/// Produced once per run by a source and handed unchanged to every destination.
/// `markdown` is always populated after a successful pull; `html` may be empty
/// for sources that only store markdown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub html: String,
    pub markdown: String,
    pub canonical_url: String,
}

impl Post {
    pub fn new(title: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            markdown: markdown.into(),
            ..Default::default()
        }
    }
}

/// Per-call parameters for a pull or push
///
/// Built fresh for every call because access tokens are short-lived.
/// Fields that do not apply to a platform kind keep their default value.
#[derive(Debug, Clone, Default)]
pub struct PlatformOptions {
    pub access_token: Option<SecretString>,
    pub blog_id: String,
    pub post_url: String,
    pub file_path: Option<PathBuf>,
}

/// The closed set of platform kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
    RemoteBlog,
    LocalMarkdown,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::RemoteBlog => "remote-blog",
            PlatformKind::LocalMarkdown => "local-markdown",
        }
    }

    /// Whether calls against this kind need an OAuth access token
    pub fn requires_credentials(&self) -> bool {
        matches!(self, PlatformKind::RemoteBlog)
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote-blog" | "blogger" => Ok(PlatformKind::RemoteBlog),
            "local-markdown" | "markdown" | "file" => Ok(PlatformKind::LocalMarkdown),
            other => Err(ConfigError::UnknownPlatform(other.to_string())),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a destination did with a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The post was written or published at `location`
    Published { location: String },
    /// Nothing was written; the target was left untouched
    Skipped { location: String, reason: String },
}

impl PushOutcome {
    pub fn location(&self) -> &str {
        match self {
            PushOutcome::Published { location } | PushOutcome::Skipped { location, .. } => location,
        }
    }
}
