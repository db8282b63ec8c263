//! Local markdown directory platform
//!
//! Each post is one `<slug>.md` file with a YAML frontmatter block:
//!
//! ```text
//! ---
//! title: Hello Post
//! canonicalUrl: https://example.blogspot.com/2024/01/hello.html
//! ---
//!
//! Hello world
//! ```
//!
//! Push is write-once unless `overwrite` is set: an existing file is left
//! untouched and reported as [`PushOutcome::Skipped`]. Files are written to a
//! temp file in `content_dir` and renamed into place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{CrossblogError, PlatformError, Result};
use crate::platforms::{Destination, Source};
use crate::types::{PlatformKind, PlatformOptions, Post, PushOutcome};

const FRONTMATTER_DELIMITER: &str = "---";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    title: String,
    #[serde(rename = "canonicalUrl", default)]
    canonical_url: String,
}

pub struct LocalMarkdown {
    name: String,
    content_dir: PathBuf,
    overwrite: bool,
}

impl LocalMarkdown {
    pub fn new(name: impl Into<String>, content_dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            name: name.into(),
            content_dir: content_dir.into(),
            overwrite,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// `<content_dir>/<slug(title)>.md`
    pub fn target_path(&self, title: &str) -> Result<PathBuf> {
        let slug = slug::slugify(title);
        if slug.is_empty() {
            return Err(CrossblogError::InvalidInput(format!(
                "title '{}' does not produce a usable file name",
                title
            )));
        }
        Ok(self.content_dir.join(format!("{}.md", slug)))
    }

    /// Locate the file for a pull; relative paths fall back to `content_dir`
    fn resolve_file(&self, file_path: &Path) -> PathBuf {
        if file_path.is_absolute() || file_path.exists() {
            file_path.to_path_buf()
        } else {
            self.content_dir.join(file_path)
        }
    }
}

/// Render the on-disk form of a post
pub fn render_document(post: &Post) -> Result<String> {
    let frontmatter = Frontmatter {
        title: post.title.clone(),
        canonical_url: post.canonical_url.clone(),
    };
    let yaml = serde_yaml::to_string(&frontmatter)
        .map_err(|e| PlatformError::Conversion(format!("Failed to render frontmatter: {}", e)))?;

    Ok(format!(
        "{delim}\n{yaml}{delim}\n\n{body}",
        delim = FRONTMATTER_DELIMITER,
        yaml = yaml,
        body = post.markdown
    ))
}

/// Split a document into its frontmatter (if any) and body
fn split_document(content: &str) -> Result<(Frontmatter, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return Ok((Frontmatter::default(), content));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONTMATTER_DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let frontmatter = if yaml.trim().is_empty() {
                Frontmatter::default()
            } else {
                serde_yaml::from_str(yaml).map_err(|e| {
                    PlatformError::Conversion(format!("Invalid frontmatter: {}", e))
                })?
            };
            return Ok((frontmatter, body));
        }
        offset += line.len();
    }

    Err(PlatformError::Conversion("Unterminated frontmatter block".to_string()).into())
}

/// Parse a document written by [`render_document`] (or by hand) back into a post
pub fn parse_document(content: &str, fallback_title: &str) -> Result<Post> {
    let (frontmatter, body) = split_document(content)?;
    let markdown = body.trim();
    if markdown.is_empty() {
        return Err(PlatformError::Conversion("Markdown body is empty".to_string()).into());
    }

    let title = if frontmatter.title.trim().is_empty() {
        fallback_title.to_string()
    } else {
        frontmatter.title
    };

    Ok(Post {
        title,
        html: String::new(),
        markdown: markdown.to_string(),
        canonical_url: frontmatter.canonical_url,
    })
}

/// Write `target` through a temp file in `dir` so a failed write never
/// leaves a partial document behind
///
/// Returns `Ok(false)` when `target` exists and `overwrite` is off.
fn publish_file(
    dir: &Path,
    target: &Path,
    overwrite: bool,
    write: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
) -> std::io::Result<bool> {
    let mut temp = NamedTempFile::new_in(dir)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    if overwrite {
        temp.persist(target).map_err(|e| e.error)?;
        return Ok(true);
    }

    match temp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

#[async_trait]
impl Destination for LocalMarkdown {
    async fn push(&self, post: &Post, _options: &PlatformOptions) -> Result<PushOutcome> {
        let path = self.target_path(&post.title)?;
        let location = path.display().to_string();
        let document = render_document(post)?;

        tokio::fs::create_dir_all(&self.content_dir).await?;

        let dir = self.content_dir.clone();
        let target = path.clone();
        let overwrite = self.overwrite;
        let written = tokio::task::spawn_blocking(move || {
            publish_file(&dir, &target, overwrite, |file| {
                file.write_all(document.as_bytes())?;
                file.flush()
            })
        })
        .await
        .map_err(|e| std::io::Error::new(IoErrorKind::Other, e))??;

        if written {
            info!(destination = %self.name, path = %location, "Wrote markdown file");
            Ok(PushOutcome::Published { location })
        } else {
            warn!(destination = %self.name, path = %location, "File already exists, not overwriting");
            Ok(PushOutcome::Skipped {
                location,
                reason: "file already exists".to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::LocalMarkdown
    }
}

#[async_trait]
impl Source for LocalMarkdown {
    async fn pull(&self, options: &PlatformOptions) -> Result<Post> {
        let file_path = options.file_path.as_deref().ok_or_else(|| {
            CrossblogError::InvalidInput(format!("a file path is required to pull from '{}'", self.name))
        })?;
        let path = self.resolve_file(file_path);
        debug!(source = %self.name, path = %path.display(), "Reading markdown file");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(PlatformError::NotFound(format!(
                    "markdown file '{}' does not exist",
                    path.display()
                ))
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        let fallback_title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        parse_document(&content, &fallback_title)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::LocalMarkdown
    }
}
