//! Platform abstraction and implementations
//!
//! A platform kind can act as a [`Source`] (something a post is pulled from),
//! a [`Destination`] (something a post is pushed to), or both. The set of kinds
//! is closed: see [`PlatformKind`] and [`PlatformInstance`]. Adding a platform
//! means adding a variant, a module here, and a case in the [`registry`].
//!
//! # Examples
//!
//! ```no_run
//! use libcrossblog::platforms::{local_markdown::LocalMarkdown, Destination};
//! use libcrossblog::types::{PlatformOptions, Post};
//!
//! # async fn example() -> libcrossblog::error::Result<()> {
//! let store = LocalMarkdown::new("notes", "content", false);
//! let post = Post::new("Hello Post", "Hello world");
//!
//! let outcome = store.push(&post, &PlatformOptions::default()).await?;
//! println!("Wrote {}", outcome.location());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PlatformKind, PlatformOptions, Post, PushOutcome};

pub mod local_markdown;
pub mod registry;
pub mod remote_blog;

// Mock platforms are available for all builds (not just tests) to support integration tests
pub mod mock;

use local_markdown::LocalMarkdown;
use remote_blog::RemoteBlog;

/// A platform a post can be pulled from
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch one post and normalize it
    ///
    /// # Errors
    ///
    /// - `PlatformError::NotFound` if the locator does not resolve
    /// - `PlatformError::Authentication` if the access token is rejected
    /// - `PlatformError::Network` for transport failures and unexpected statuses
    /// - `PlatformError::Conversion` if the HTML body cannot be turned into markdown
    async fn pull(&self, options: &PlatformOptions) -> Result<Post>;

    /// Configured name, unique among sources
    fn name(&self) -> &str;

    fn kind(&self) -> PlatformKind;

    fn supports_pull(&self) -> bool {
        true
    }

    /// Typed view used when preparing OAuth credentials
    fn as_remote_blog(&self) -> Option<&RemoteBlog> {
        None
    }
}

/// A platform a post can be pushed to
#[async_trait]
pub trait Destination: Send + Sync {
    /// Publish or write one post
    ///
    /// Write-once destinations report an existing target as
    /// [`PushOutcome::Skipped`] instead of overwriting it.
    ///
    /// # Errors
    ///
    /// - `PlatformError::NotImplemented` if the platform cannot act as a destination
    /// - `PlatformError::Authentication` / `PlatformError::Network` for remote failures
    /// - `CrossblogError::Io` for local write failures
    async fn push(&self, post: &Post, options: &PlatformOptions) -> Result<PushOutcome>;

    /// Configured name, unique among destinations
    fn name(&self) -> &str;

    fn kind(&self) -> PlatformKind;

    fn supports_push(&self) -> bool {
        true
    }

    /// Typed view used when preparing OAuth credentials
    fn as_remote_blog(&self) -> Option<&RemoteBlog> {
        None
    }
}

/// A configured platform before it is assigned a role
pub enum PlatformInstance {
    RemoteBlog(RemoteBlog),
    LocalMarkdown(LocalMarkdown),
}

impl PlatformInstance {
    pub fn kind(&self) -> PlatformKind {
        match self {
            PlatformInstance::RemoteBlog(_) => PlatformKind::RemoteBlog,
            PlatformInstance::LocalMarkdown(_) => PlatformKind::LocalMarkdown,
        }
    }

    pub fn into_source(self) -> Box<dyn Source> {
        match self {
            PlatformInstance::RemoteBlog(p) => Box::new(p),
            PlatformInstance::LocalMarkdown(p) => Box::new(p),
        }
    }

    pub fn into_destination(self) -> Box<dyn Destination> {
        match self {
            PlatformInstance::RemoteBlog(p) => Box::new(p),
            PlatformInstance::LocalMarkdown(p) => Box::new(p),
        }
    }
}
