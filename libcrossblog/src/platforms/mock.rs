//! Mock platforms for testing
//!
//! Configurable stand-ins for a source and a destination, so orchestration
//! logic (ordering, dry-run, failure policy) can be exercised without network
//! access or a filesystem. Call counters are shared through `Arc`, so a test
//! can keep a handle after boxing the mock into a trait object.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::{Destination, Source};
use crate::types::{PlatformKind, PlatformOptions, Post, PushOutcome};

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Kind reported to the orchestrator
    pub kind: PlatformKind,

    /// Post returned by `pull`
    pub post: Post,

    /// Error returned by `pull` or `push` instead of succeeding
    pub error: Option<PlatformError>,

    /// Whether the destination accepts pushes at all
    pub supports_push: bool,

    /// Simulated latency per call
    pub delay: Duration,

    pub pull_call_count: Arc<Mutex<usize>>,
    pub push_call_count: Arc<Mutex<usize>>,

    /// Titles of every post pushed, in order
    pub pushed_titles: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            kind: PlatformKind::LocalMarkdown,
            post: Post::new("Mock Post", "Mock body"),
            error: None,
            supports_push: true,
            delay: Duration::ZERO,
            pull_call_count: Arc::new(Mutex::new(0)),
            push_call_count: Arc::new(Mutex::new(0)),
            pushed_titles: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConfig {
    pub fn pull_call_count(&self) -> usize {
        self.pull_call_count.lock().map(|c| *c).unwrap_or_default()
    }

    pub fn push_call_count(&self) -> usize {
        self.push_call_count.lock().map(|c| *c).unwrap_or_default()
    }

    pub fn pushed_titles(&self) -> Vec<String> {
        self.pushed_titles
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    async fn simulate_call(&self, counter: &Mutex<usize>) {
        if let Ok(mut count) = counter.lock() {
            *count += 1;
        }
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

/// Mock source returning a fixed post
pub struct MockSource {
    config: MockConfig,
}

impl MockSource {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    pub fn with_post(name: &str, post: Post) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post,
            ..Default::default()
        })
    }

    pub fn failure(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            error: Some(error),
            ..Default::default()
        })
    }

    /// Shared handle to the counters
    pub fn config(&self) -> MockConfig {
        self.config.clone()
    }
}

#[async_trait]
impl Source for MockSource {
    async fn pull(&self, _options: &PlatformOptions) -> Result<Post> {
        self.config
            .simulate_call(&self.config.pull_call_count)
            .await;

        match &self.config.error {
            Some(error) => Err(error.clone().into()),
            None => Ok(self.config.post.clone()),
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> PlatformKind {
        self.config.kind
    }
}

/// Mock destination recording what it receives
pub struct MockDestination {
    config: MockConfig,
}

impl MockDestination {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub fn failure(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            error: Some(error),
            ..Default::default()
        })
    }

    /// A destination kind that cannot be pushed to
    pub fn unsupported(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            supports_push: false,
            ..Default::default()
        })
    }

    pub fn config(&self) -> MockConfig {
        self.config.clone()
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn push(&self, post: &Post, _options: &PlatformOptions) -> Result<PushOutcome> {
        self.config
            .simulate_call(&self.config.push_call_count)
            .await;

        if !self.config.supports_push {
            return Err(PlatformError::NotImplemented(format!(
                "mock '{}' does not support push",
                self.config.name
            ))
            .into());
        }

        if let Some(error) = &self.config.error {
            return Err(error.clone().into());
        }

        if let Ok(mut titles) = self.config.pushed_titles.lock() {
            titles.push(post.title.clone());
        }

        Ok(PushOutcome::Published {
            location: format!("mock://{}/{}", self.config.name, slug::slugify(&post.title)),
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> PlatformKind {
        self.config.kind
    }

    fn supports_push(&self) -> bool {
        self.config.supports_push
    }
}
