//! Lifeline - command-line entry point.
//!
//! Builds the data-access layer from the config file and environment, runs
//! one command against it, then shuts it down.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lifeline_core::content::SectionKind;
use lifeline_core::{Config, FetchOptions, Fetcher, Lifeline, TokioClock};

// ============================================================================
// Constants
// ============================================================================

/// File name prefix for the daily log file
const LOG_FILE_PREFIX: &str = "lifeline.log";

// ===== Arguments =====

#[derive(Parser, Debug)]
#[command(name = "lifeline", version, about = "Degrade-gracefully data access for site content")]
struct Cli {
    /// Path to config file (default: <config dir>/lifeline/config.json)
    #[arg(short, long, global = true, env = "LIFELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the store connection state after startup
    Status,
    /// Read or write site content
    #[command(subcommand)]
    Content(ContentCommand),
    /// Fetch an API endpoint through the retrying client
    Fetch(FetchArgs),
    /// Keep the service up until Ctrl-C
    Run,
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ContentCommand {
    /// Print one section (cta, about-hero, team, stats, events, impact)
    Get { kind: SectionKind },
    /// Save the call-to-action section from a JSON file
    SaveCta { file: PathBuf },
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Endpoint path, e.g. /api/stat/stats
    endpoint: String,

    /// Serve through the response cache under this key
    #[arg(long)]
    cache_key: Option<String>,

    #[arg(long)]
    retries: Option<u32>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Answer with the demo envelope without touching the network
    #[arg(long)]
    demo: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,
}

// ===== Logging =====

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g. RUST_LOG=lifeline_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ===== Commands =====

async fn status(config: Config) -> Result<()> {
    let lifeline = Lifeline::init(config).await?;
    let connection = lifeline.connection();
    println!("state:       {}", connection.state());
    println!("store:       {}", connection.describe_target());
    println!("demo mode:   {}", connection.is_demo_mode());
    println!("api:         {}", lifeline.fetcher().base_url());
    println!("client demo: {}", lifeline.fetcher().is_demo_mode());
    lifeline.shutdown().await;
    Ok(())
}

async fn content(config: Config, cmd: ContentCommand) -> Result<()> {
    let lifeline = Lifeline::init(config).await?;
    let result = match cmd {
        ContentCommand::Get { kind } => {
            let section = lifeline.content().get_section(kind).await;
            print_json(&section)
        }
        ContentCommand::SaveCta { file } => save_cta(&lifeline, &file).await,
    };
    lifeline.shutdown().await;
    result
}

async fn save_cta(lifeline: &Lifeline, file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let body: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    match lifeline.content().save_cta(body).await {
        Ok(envelope) => print_json(&envelope),
        Err(response) => {
            eprintln!("HTTP {}", response.status);
            print_json(&response.body)
        }
    }
}

async fn fetch(config: Config, args: FetchArgs) -> Result<()> {
    // The HTTP client works without the store, so skip connecting to it
    let fetcher = Fetcher::from_config(&config, Arc::new(TokioClock))
        .context("Failed to create HTTP client")?;

    let mut options = FetchOptions::new();
    if let Some(key) = args.cache_key {
        options = options.cache_key(key);
    }
    if let Some(retries) = args.retries {
        options = options.retries(retries);
    }
    if let Some(ms) = args.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }
    if args.demo {
        options = options.demo_mode(true);
    }

    let response = fetcher.safe_fetch::<Value>(&args.endpoint, options).await;
    print_json(&response)
}

async fn run(config: Config) -> Result<()> {
    let lifeline = Lifeline::init(config).await?;
    info!(state = %lifeline.connection().state(), "Running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    lifeline.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());

    let config = Config::load(cli.config.as_deref())?;

    match cli.cmd {
        Command::Status => status(config).await,
        Command::Content(cmd) => content(config, cmd).await,
        Command::Fetch(args) => fetch(config, args).await,
        Command::Run => run(config).await,
        Command::Config(ConfigCommand::Show) => print_json(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_content_get() {
        let cli = Cli::try_parse_from(["lifeline", "content", "get", "about-hero"]).unwrap();
        match cli.cmd {
            Command::Content(ContentCommand::Get { kind }) => assert_eq!(kind, SectionKind::AboutHero),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        assert!(Cli::try_parse_from(["lifeline", "content", "get", "footer"]).is_err());
    }

    #[test]
    fn test_parse_fetch_options() {
        let cli = Cli::try_parse_from([
            "lifeline", "fetch", "/api/impact", "--retries", "0", "--timeout-ms", "250", "--demo",
        ])
        .unwrap();
        let Command::Fetch(args) = cli.cmd else {
            panic!("expected fetch");
        };
        assert_eq!(args.endpoint, "/api/impact");
        assert_eq!(args.retries, Some(0));
        assert_eq!(args.timeout_ms, Some(250));
        assert!(args.demo);
        assert!(args.cache_key.is_none());
    }
}
