//! Remote blog platform (Blogger v3 API)
//!
//! Pull-only: posts are addressed by their public URL path relative to the
//! blog's base URL, and the blog itself by the numeric id returned from a
//! lookup-by-URL. Every request carries a bearer access token obtained through
//! the credential broker.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::convert::MarkdownConverter;
use crate::error::{CrossblogError, PlatformError, Result};
use crate::platforms::{Destination, Source};
use crate::types::{PlatformKind, PlatformOptions, Post, PushOutcome};

#[derive(Debug, Deserialize)]
struct BlogResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    title: String,
    content: String,
    url: String,
}

/// A blog hosted behind the Blogger API
pub struct RemoteBlog {
    name: String,
    blog_url: String,
    api_base: String,
    http: Client,
    converter: Arc<dyn MarkdownConverter>,
}

impl RemoteBlog {
    pub fn new(
        name: impl Into<String>,
        blog_url: impl Into<String>,
        api_base: impl Into<String>,
        http: Client,
        converter: Arc<dyn MarkdownConverter>,
    ) -> Self {
        Self {
            name: name.into(),
            blog_url: blog_url.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http,
            converter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blog_url(&self) -> &str {
        &self.blog_url
    }

    /// Look up the remote blog id for the configured blog URL
    ///
    /// Not cached: every call performs one request.
    pub async fn get_blog_id(&self, access_token: &SecretString) -> Result<String> {
        let url = format!("{}/blogs/byurl", self.api_base);
        let blog: BlogResponse = self
            .get_json(&url, &[("url", self.blog_url.as_str())], access_token, "get blog id")
            .await?;
        debug!(blog = %self.name, blog_id = %blog.id, "Resolved blog id");
        Ok(blog.id)
    }

    /// Path of a post relative to the blog, e.g. `/2024/01/hello.html`
    fn post_path<'a>(&self, post_url: &'a str) -> Result<&'a str> {
        let base = self.blog_url.trim_end_matches('/');
        let path = post_url.strip_prefix(base).unwrap_or(post_url);

        if !path.starts_with('/') {
            return Err(CrossblogError::InvalidInput(format!(
                "post URL '{}' is not under blog URL '{}'",
                post_url, self.blog_url
            )));
        }
        Ok(path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        access_token: &SecretString,
        context: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Blogger request failed ({}): {}", context, e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(map_status(status, &body, context).into());
        }

        serde_json::from_str(&body).map_err(|e| {
            PlatformError::Network(format!("Unexpected Blogger response ({}): {}", context, e)).into()
        })
    }
}

/// Map a non-success Blogger status to a platform error
fn map_status(status: StatusCode, body: &str, context: &str) -> PlatformError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(format!(
            "Blogger rejected the access token during {} ({}): {}",
            context, status, body
        )),
        StatusCode::NOT_FOUND => {
            PlatformError::NotFound(format!("Blogger returned 404 during {}: {}", context, body))
        }
        _ => PlatformError::Network(format!(
            "Blogger returned {} during {}: {}",
            status, context, body
        )),
    }
}

#[async_trait]
impl Source for RemoteBlog {
    async fn pull(&self, options: &PlatformOptions) -> Result<Post> {
        info!(source = %self.name, post_url = %options.post_url, "Remote blog pull called");

        let access_token = options.access_token.as_ref().ok_or_else(|| {
            PlatformError::Authentication(format!("No access token supplied for '{}'", self.name))
        })?;
        if options.blog_id.is_empty() {
            return Err(CrossblogError::InvalidInput(format!(
                "blog id is required to pull from '{}'",
                self.name
            )));
        }

        let path = self.post_path(&options.post_url)?;
        let url = format!("{}/blogs/{}/posts/bypath", self.api_base, options.blog_id);
        let response: PostResponse = self
            .get_json(&url, &[("path", path)], access_token, "get post")
            .await?;

        let markdown = self.converter.convert(&response.content)?;

        Ok(Post {
            title: response.title,
            html: response.content,
            markdown,
            canonical_url: response.url,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::RemoteBlog
    }

    fn as_remote_blog(&self) -> Option<&RemoteBlog> {
        Some(self)
    }
}

#[async_trait]
impl Destination for RemoteBlog {
    async fn push(&self, _post: &Post, _options: &PlatformOptions) -> Result<PushOutcome> {
        Err(PlatformError::NotImplemented(format!(
            "remote blog '{}' does not support publishing yet",
            self.name
        ))
        .into())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::RemoteBlog
    }

    fn supports_push(&self) -> bool {
        false
    }

    fn as_remote_blog(&self) -> Option<&RemoteBlog> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Html2MdConverter;
    use crate::error::ErrorKind;
    use mockito::Matcher;

    fn blog(api_base: &str) -> RemoteBlog {
        RemoteBlog::new(
            "someblog",
            "https://example.blogspot.com",
            api_base,
            Client::new(),
            Arc::new(Html2MdConverter),
        )
    }

    fn token() -> SecretString {
        SecretString::from("ya29.test".to_string())
    }

    fn options(post_url: &str) -> PlatformOptions {
        PlatformOptions {
            access_token: Some(token()),
            blog_id: "42".to_string(),
            post_url: post_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_post_path_strips_blog_url() {
        let blog = blog("http://unused");
        assert_eq!(
            blog.post_path("https://example.blogspot.com/2024/01/hello.html")
                .unwrap(),
            "/2024/01/hello.html"
        );
        assert_eq!(blog.post_path("/2024/01/hello.html").unwrap(), "/2024/01/hello.html");
        assert!(blog.post_path("https://other.example/2024/01/hello.html").is_err());
    }

    #[tokio::test]
    async fn test_get_blog_id_uses_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/blogs/byurl")
            .match_query(Matcher::UrlEncoded(
                "url".into(),
                "https://example.blogspot.com".into(),
            ))
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_body(r#"{"id":"42","name":"Example"}"#)
            .create_async()
            .await;

        let id = blog(&server.url()).get_blog_id(&token()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn test_pull_converts_html_to_markdown() {
        let mut server = mockito::Server::new_async().await;
        let html = "<p>Hello <strong>world</strong></p>";
        let mock = server
            .mock("GET", "/blogs/42/posts/bypath")
            .match_query(Matcher::UrlEncoded("path".into(), "/2024/01/hello.html".into()))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "title": "Hello Post",
                    "content": html,
                    "url": "https://example.blogspot.com/2024/01/hello.html"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let post = Source::pull(
            &blog(&server.url()),
            &options("https://example.blogspot.com/2024/01/hello.html"),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(post.title, "Hello Post");
        assert_eq!(post.html, html);
        assert_eq!(post.canonical_url, "https://example.blogspot.com/2024/01/hello.html");
        assert!(!post.markdown.is_empty());
        assert_eq!(post.markdown, Html2MdConverter.convert(html).unwrap());
    }

    #[tokio::test]
    async fn test_pull_maps_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/blogs/42/posts/bypath")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"Not Found"}}"#)
            .create_async()
            .await;

        let err = Source::pull(&blog(&server.url()), &options("/missing.html"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_pull_maps_401_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/blogs/42/posts/bypath")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = Source::pull(&blog(&server.url()), &options("/post.html"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_pull_maps_500_to_transport() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/blogs/42/posts/bypath")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = Source::pull(&blog(&server.url()), &options("/post.html"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_pull_without_token_is_authentication_error() {
        let opts = PlatformOptions {
            access_token: None,
            ..options("/post.html")
        };
        let err = Source::pull(&blog("http://127.0.0.1:9"), &opts)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_push_is_unsupported() {
        let blog = blog("http://127.0.0.1:9");
        assert!(!Destination::supports_push(&blog));

        let err = Destination::push(&blog, &Post::new("t", "b"), &PlatformOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
