//! crossblog-publish - Copy a post from one blog to others

use anyhow::bail;
use clap::Parser;
use libcrossblog::config::{resolve_config_path, Config, ConfigFileTokenStore};
use libcrossblog::logging::{LogFormat, LoggingConfig};
use libcrossblog::{CrossblogError, FailurePolicy, SyncOrchestrator, SyncReport, SyncRequest};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "crossblog-publish")]
#[command(version)]
#[command(about = "Copy a post from one blog to others")]
#[command(long_about = "\
crossblog-publish - Copy a post from one blog to others

DESCRIPTION:
    Pulls one post from a configured source and pushes it to each listed
    destination, in order. Remote blogs are read through the Blogger API
    using Google OAuth; local destinations receive a markdown file with
    a title/canonicalUrl frontmatter block.

USAGE:
    # Copy a Blogger post into a local markdown directory
    crossblog-publish someblog https://example.blogspot.com/2024/01/hello.html otherblog

    # See what would happen without writing anything
    crossblog-publish --dry-run someblog https://example.blogspot.com/2024/01/hello.html otherblog

CONFIGURATION:
    Configuration file: ./config.toml or ~/.config/crossblog/config.toml
    A default file is created on first run if none exists.

EXIT CODES:
    0 - Every destination published or skipped
    1 - Runtime or configuration error, or some destinations failed
    2 - Authorization failed or timed out
    3 - Invalid input or command-line usage error
")]
struct Cli {
    /// Name of the source entry to pull from
    source: String,

    /// Post URL (remote blog) or file path (local markdown)
    locator: String,

    /// Names of destination entries to push to, in order
    destinations: Vec<String>,

    /// Path to the configuration file
    #[arg(short, long, env = "CROSSBLOG_CONFIG", value_name = "PATH")]
    config: Option<String>,

    /// Resolve and authorize everything but write nothing
    #[arg(short = 'r', long)]
    dry_run: bool,

    /// Keep pushing after a destination fails
    #[arg(long)]
    continue_on_error: bool,

    /// Google OAuth client id (overrides config)
    #[arg(long, env = "CROSSBLOG_GOOGLE_CLIENT_ID", hide_env_values = true)]
    google_client_id: Option<String>,

    /// Google OAuth client secret (overrides config)
    #[arg(long, env = "CROSSBLOG_GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    google_client_secret: Option<String>,

    /// Google refresh token (overrides config)
    #[arg(long, env = "GOOGLE_REFRESH_TOKEN", hide_env_values = true)]
    google_refresh_token: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(usage_exit_code(&e));
        }
    };

    let mut logging = LoggingConfig::from_env().with_verbose(cli.verbose);
    if let Some(format) = cli.log_format {
        logging = logging.with_format(format);
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<CrossblogError>()
            .map(CrossblogError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

/// Help and version exit 0; every other parse failure is invalid input
fn usage_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        CrossblogError::InvalidInput(String::new()).exit_code()
    } else {
        0
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref())?;

    if !config_path.exists() {
        Config::write_default(&config_path)?;
        bail!(
            "No configuration found. Created a default one at {}; edit it and run again",
            config_path.display()
        );
    }

    let mut config = Config::load_from_path(&config_path)?;
    apply_overrides(&mut config, &cli);
    debug!(path = %config_path.display(), dry_run = config.dry_run, "Configuration ready");

    let request = SyncRequest::new(cli.source, cli.locator, cli.destinations);
    let token_store = Arc::new(ConfigFileTokenStore::new(&config_path));
    let mut orchestrator = SyncOrchestrator::new(&config, token_store);

    match orchestrator.run(&request).await {
        Ok(report) => {
            print_report(&report);
            info!(destinations = report.destinations.len(), "Sync finished");
            Ok(())
        }
        Err(e) => {
            // Partial runs still say what happened to each destination
            if let Some(report) = orchestrator.last_report() {
                print_report(report);
            }
            Err(e.into())
        }
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.continue_on_error {
        config.failure_policy = FailurePolicy::Continue;
    }

    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    if let Some(client_id) = non_empty(&cli.google_client_id) {
        config.google.client_id = client_id;
    }
    if let Some(client_secret) = non_empty(&cli.google_client_secret) {
        config.google.client_secret = client_secret;
    }
    if let Some(refresh_token) = non_empty(&cli.google_refresh_token) {
        config.google.refresh_token = Some(refresh_token);
    }
}

fn print_report(report: &SyncReport) {
    for outcome in &report.destinations {
        println!("{} ({}): {}", outcome.name, outcome.kind, outcome.status);
    }
}
