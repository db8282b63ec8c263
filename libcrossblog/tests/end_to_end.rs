//! End-to-end sync tests
//!
//! These drive the orchestrator from a TOML configuration, with the Google
//! token endpoint and the Blogger API served by mockito and local markdown
//! directories in temp dirs.

use anyhow::Result;
use libcrossblog::config::{Config, ConfigFileTokenStore, MemoryTokenStore};
use libcrossblog::error::{CrossblogError, ErrorKind};
use libcrossblog::oauth::{ClientCredentials, CredentialBroker};
use libcrossblog::platforms::local_markdown::LocalMarkdown;
use libcrossblog::platforms::registry::Registry;
use libcrossblog::platforms::Source;
use libcrossblog::sync::{DestinationStatus, SyncOrchestrator, SyncRequest};
use libcrossblog::types::PlatformOptions;
use mockito::{Matcher, Server, ServerGuard};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BLOG_URL: &str = "https://example.blogspot.com";
const POST_URL: &str = "https://example.blogspot.com/2024/01/hello.html";

fn remote_config(server: &ServerGuard, refresh_token: Option<&str>, content_dir: &Path) -> String {
    let refresh = refresh_token
        .map(|t| format!("refresh_token = '{}'\n", t))
        .unwrap_or_default();

    format!(
        r#"
[google]
client_id = 'client-123'
client_secret = 'secret-456'
{refresh}
[oauth]
token_url = '{base}/token'

[remote_blog]
api_base = '{base}'

[[sources]]
name = 'someblog'
type = 'remote-blog'
blog_url = '{blog}'

[[destinations]]
name = 'notes'
type = 'local-markdown'
content_dir = '{dir}'
"#,
        refresh = refresh,
        base = server.url(),
        blog = BLOG_URL,
        dir = content_dir.display(),
    )
}

async fn mock_blogger(server: &mut ServerGuard) -> (mockito::Mock, mockito::Mock) {
    let blog = server
        .mock("GET", "/blogs/byurl")
        .match_query(Matcher::UrlEncoded("url".into(), BLOG_URL.into()))
        .with_status(200)
        .with_body(r#"{"id":"42"}"#)
        .create_async()
        .await;

    let post = server
        .mock("GET", "/blogs/42/posts/bypath")
        .match_query(Matcher::UrlEncoded("path".into(), "/2024/01/hello.html".into()))
        .with_status(200)
        .with_body(
            serde_json::json!({
                "title": "Hello Post",
                "content": "<p>Hello world</p>",
                "url": POST_URL,
            })
            .to_string(),
        )
        .create_async()
        .await;

    (blog, post)
}

fn local_config(source_dir: &Path, destinations: &[(&str, &Path)]) -> String {
    let mut toml = format!(
        "[[sources]]\nname = 'drafts'\ntype = 'local-markdown'\ncontent_dir = '{}'\n",
        source_dir.display()
    );
    for (name, dir) in destinations {
        toml.push_str(&format!(
            "\n[[destinations]]\nname = '{}'\ntype = 'local-markdown'\ncontent_dir = '{}'\n",
            name,
            dir.display()
        ));
    }
    toml
}

fn write_draft(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join("draft.md"),
        "---\ntitle: Hello Post\n---\n\nHello world\n",
    )?;
    Ok(())
}

#[tokio::test]
async fn test_remote_blog_to_local_markdown() -> Result<()> {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
        .with_status(200)
        .with_body(r#"{"access_token":"ya29.access","expires_in":3599}"#)
        .expect(1)
        .create_async()
        .await;
    let (blog, post) = mock_blogger(&mut server).await;

    let temp = TempDir::new()?;
    let content_dir = temp.path().join("content");
    let config = Config::from_toml_str(&remote_config(&server, Some("1//stored"), &content_dir))?;
    let store = Arc::new(MemoryTokenStore::new());

    let mut orchestrator = SyncOrchestrator::new(&config, store.clone());
    let report = orchestrator
        .run(&SyncRequest::new("someblog", POST_URL, ["notes"]))
        .await?;

    token.assert_async().await;
    blog.assert_async().await;
    post.assert_async().await;

    let path = content_dir.join("hello-post.md");
    assert_eq!(
        report.destinations[0].status,
        DestinationStatus::Published {
            location: path.display().to_string()
        }
    );
    assert_eq!(report.post.canonical_url, POST_URL);

    let written = std::fs::read_to_string(&path)?;
    assert!(written.starts_with("---\ntitle: Hello Post\n"));
    assert!(written.contains(POST_URL));
    assert!(written.trim_end().ends_with("Hello world"));

    // A stored refresh token is never rewritten
    assert!(store.saved().is_empty());

    // The written file pulls back to the same post
    let local = LocalMarkdown::new("notes", &content_dir, false);
    let pulled = local
        .pull(&PlatformOptions {
            file_path: Some("hello-post.md".into()),
            ..Default::default()
        })
        .await?;
    assert_eq!(pulled.title, "Hello Post");
    assert_eq!(pulled.markdown, report.post.markdown);
    assert_eq!(pulled.canonical_url, POST_URL);

    Ok(())
}

#[tokio::test]
async fn test_second_run_skips_existing_file() -> Result<()> {
    let temp = TempDir::new()?;
    let drafts = temp.path().join("drafts");
    let out = temp.path().join("out");
    write_draft(&drafts)?;

    let config = Config::from_toml_str(&local_config(&drafts, &[("out", &out)]))?;
    let mut orchestrator = SyncOrchestrator::new(&config, Arc::new(MemoryTokenStore::new()));
    let request = SyncRequest::new("drafts", "draft.md", ["out"]);

    let first = orchestrator.run(&request).await?;
    let written = std::fs::read_to_string(out.join("hello-post.md"))?;
    assert!(written.contains("title: Hello Post"));
    assert!(written.trim_end().ends_with("Hello world"));

    let second = orchestrator.run(&request).await?;

    assert!(matches!(
        first.destinations[0].status,
        DestinationStatus::Published { .. }
    ));
    assert!(matches!(
        second.destinations[0].status,
        DestinationStatus::Skipped { .. }
    ));
    assert_eq!(std::fs::read_dir(&out)?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let drafts = temp.path().join("drafts");
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    write_draft(&drafts)?;

    let mut config = Config::from_toml_str(&local_config(&drafts, &[("a", &a), ("b", &b)]))?;
    config.dry_run = true;

    let report = SyncOrchestrator::new(&config, Arc::new(MemoryTokenStore::new()))
        .run(&SyncRequest::new("drafts", "draft.md", ["a", "b"]))
        .await?;

    assert_eq!(report.destinations.len(), 2);
    for outcome in &report.destinations {
        assert_eq!(outcome.status, DestinationStatus::DryRun);
    }
    assert!(!a.exists());
    assert!(!b.exists());
    Ok(())
}

#[tokio::test]
async fn test_halt_policy_stops_at_first_failure() -> Result<()> {
    let temp = TempDir::new()?;
    let drafts = temp.path().join("drafts");
    write_draft(&drafts)?;

    // A content_dir below a regular file cannot be created
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, "not a directory")?;
    let broken = blocker.join("content");
    let good = temp.path().join("good");

    let config = Config::from_toml_str(&local_config(
        &drafts,
        &[("broken", &broken), ("good", &good)],
    ))?;

    let err = SyncOrchestrator::new(&config, Arc::new(MemoryTokenStore::new()))
        .run(&SyncRequest::new("drafts", "draft.md", ["broken", "good"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("push to destination 'broken'"));
    assert!(!good.exists());
    Ok(())
}

#[tokio::test]
async fn test_continue_policy_reports_partial_failure() -> Result<()> {
    let temp = TempDir::new()?;
    let drafts = temp.path().join("drafts");
    write_draft(&drafts)?;

    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, "not a directory")?;
    let broken = blocker.join("content");
    let good = temp.path().join("good");

    let mut config = Config::from_toml_str(&local_config(
        &drafts,
        &[("broken", &broken), ("good", &good)],
    ))?;
    config.failure_policy = libcrossblog::FailurePolicy::Continue;

    let mut orchestrator = SyncOrchestrator::new(&config, Arc::new(MemoryTokenStore::new()));
    let err = orchestrator
        .run(&SyncRequest::new("drafts", "draft.md", ["broken", "good"]))
        .await
        .unwrap_err();

    assert!(matches!(err, CrossblogError::PartialFailure(ref names) if names == &["broken"]));
    assert!(good.join("hello-post.md").exists());

    let report = orchestrator.last_report().expect("report is kept");
    assert!(report.destinations[0].status.is_failure());
    Ok(())
}

#[tokio::test]
async fn test_unknown_source_name_is_not_found() -> Result<()> {
    let temp = TempDir::new()?;
    let config = Config::from_toml_str(&local_config(temp.path(), &[]))?;

    let err = SyncOrchestrator::new(&config, Arc::new(MemoryTokenStore::new()))
        .run(&SyncRequest::new("nonexistent", "draft.md", Vec::<String>::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, CrossblogError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_interactive_flow_persists_fresh_refresh_token() -> Result<()> {
    let mut server = Server::new_async().await;
    let exchange = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"ya29.new","refresh_token":"1//fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let _blogger = mock_blogger(&mut server).await;

    let temp = TempDir::new()?;
    let content_dir = temp.path().join("content");
    let config_path = temp.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!("dry_run = false\n{}", remote_config(&server, None, &content_dir)),
    )?;
    let config = Config::load_from_path(&config_path)?;

    // Pick a free port for the callback listener
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let mut settings = config.oauth.to_settings();
    settings.callback_port = port;
    settings.callback_timeout = Duration::from_secs(10);

    // Stand in for the browser: follow the redirect with the issued state
    let broker = CredentialBroker::new(ClientCredentials::new("client-123", "secret-456"), settings)
        .with_prompt(Arc::new(|url: &str| {
            let url = reqwest::Url::parse(url).expect("authorization url");
            let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
            let redirect = format!(
                "{}?code=auth-code&state={}",
                pairs["redirect_uri"], pairs["state"]
            );
            tokio::spawn(async move {
                let _ = reqwest::get(redirect).await;
            });
        }));

    let mut orchestrator =
        SyncOrchestrator::new(&config, Arc::new(ConfigFileTokenStore::new(&config_path)))
            .with_broker(broker);
    orchestrator
        .run(&SyncRequest::new("someblog", POST_URL, ["notes"]))
        .await?;

    exchange.assert_async().await;

    let reloaded = Config::load_from_path(&config_path)?;
    assert_eq!(reloaded.google.refresh_token.as_deref(), Some("1//fresh"));
    assert_eq!(reloaded.sources.len(), 1);
    assert!(content_dir.join("hello-post.md").exists());
    Ok(())
}

#[tokio::test]
async fn test_blog_id_cache() -> Result<()> {
    for (cache, expected_lookups) in [(true, 1), (false, 2)] {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.access"}"#)
            .create_async()
            .await;
        let lookup = server
            .mock("GET", "/blogs/byurl")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"42"}"#)
            .expect(expected_lookups)
            .create_async()
            .await;

        let temp = TempDir::new()?;
        let mut config =
            Config::from_toml_str(&remote_config(&server, Some("1//stored"), temp.path()))?;
        config.remote_blog.cache_blog_id = cache;

        let source = Registry::new(&config).create_source(&config.sources[0])?;
        let mut orchestrator = SyncOrchestrator::new(&config, Arc::new(MemoryTokenStore::new()));

        for _ in 0..2 {
            let prepared = orchestrator
                .prepare_credentials(Some(source.as_ref()), None)
                .await?;
            assert_eq!(prepared.blog_id, "42");
        }

        lookup.assert_async().await;
    }
    Ok(())
}
