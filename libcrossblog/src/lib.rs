//! Crossblog - move a post from one blog to others
//!
//! A post is pulled once from a configured source, normalized into a
//! [`Post`] with a markdown body, and pushed to each configured destination.
//! Remote blogs are reached through Google OAuth credentials brokered by
//! [`oauth::CredentialBroker`].

pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod platforms;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigFileTokenStore, FailurePolicy, RefreshTokenStore};
pub use error::{CrossblogError, ErrorKind, Result};
pub use platforms::registry::Registry;
pub use platforms::{Destination, Source};
pub use sync::{DestinationOutcome, DestinationStatus, SyncOrchestrator, SyncReport, SyncRequest};
pub use types::{PlatformKind, PlatformOptions, Post, PushOutcome};
