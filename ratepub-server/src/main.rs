//! Rate Publisher Server
//!
//! Publishes fiat and bitcoin exchange rates to a Nostr relay as replaceable
//! events, on cadences aligned to the wall clock.

mod config;
mod shutdown;

use clap::Parser;
use config::runtime::LoadedConfig;
use config::{ConfigLoader, load_signing_keys};
use ratepub_core::processors::{Feed, Orchestrator, Publisher};
use ratepub_core::utils::clock::SystemClock;
use ratepub_sdk::client::RelayClient;
use shutdown::{ShutdownSignals, spawn_shutdown_listener};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for one upstream rate request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate Publisher - scheduled exchange rates on Nostr
#[derive(Parser, Debug)]
#[command(name = "ratepub-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (optional; built-in feeds if absent)
    #[arg(short, long, default_value = "./ratepub.toml")]
    config: PathBuf,

    /// Override the relay URL (e.g., wss://relay.example.com)
    #[arg(long, env = "RELAY_URL")]
    relay_url: Option<String>,

    /// Override the application name used in default tags
    #[arg(long, env = "APP_NAME")]
    app_name: Option<String>,

    /// Only run the named feed; repeat to select several
    #[arg(long = "feed", value_name = "NAME")]
    feeds: Vec<String>,

    /// Run the selected feeds once, then exit
    #[arg(long, default_value = "false")]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // `.env` must be loaded before parsing so `env = ...` arguments see it.
    let dotenv = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.json_logs);

    if let Ok(path) = &dotenv {
        tracing::debug!("Environment loaded from {:?}", path);
    }
    tracing::info!("Starting ratepub-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let loaded_config = ConfigLoader::new(&args.config)
        .with_app_name(args.app_name)
        .with_relay_url(args.relay_url)
        .with_feed_filter(args.feeds)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;

    // Signing key from the environment
    let keys = load_signing_keys().map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    log_banner(&loaded_config, &keys.public_key_hex());

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("ratepub-server/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let feeds = loaded_config
        .feeds
        .iter()
        .map(|f| Feed::new(f.spec.clone(), f.source.build(http_client.clone())))
        .collect();

    // One relay connection for the whole process, opened on first publish.
    let relay = Arc::new(
        RelayClient::new(loaded_config.relay.url.clone())
            .with_response_timeout(loaded_config.relay.publish_timeout),
    );
    let publisher = Publisher::new(Box::new(keys), relay, loaded_config.relay.publish_timeout);
    let orchestrator = Orchestrator::new(feeds, publisher, Arc::new(SystemClock)).map_err(|e| {
        tracing::error!("Invalid feed schedule: {}", e);
        e
    })?;

    if args.once {
        let summary = orchestrator.run_once().await;
        orchestrator.shutdown().await;
        if summary.all_published() {
            tracing::info!(published = ?summary.published, "One-shot run complete");
            return Ok(ExitCode::SUCCESS);
        }
        tracing::error!(failed = ?summary.failed, "One-shot run finished with failures");
        return Ok(ExitCode::FAILURE);
    }

    // Install signal handlers before the first publish
    let signals = ShutdownSignals::install()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = spawn_shutdown_listener(signals, shutdown_tx);

    orchestrator.run(shutdown_rx).await;

    listener.abort();
    tracing::info!("Publisher shutdown complete");
    Ok(ExitCode::SUCCESS)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ratepub_core=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn log_banner(config: &LoadedConfig, pubkey: &str) {
    tracing::info!("App name: {}", config.app_name);
    tracing::info!("Relay: {}", config.relay.url);
    tracing::info!("Public key: {}", pubkey);
    for feed in &config.feeds {
        let currencies = feed
            .spec
            .classification_labels()
            .map(|(_, code)| code)
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            feed = %feed.spec.name,
            source = ?feed.source,
            d = %feed.spec.replaceable_tag,
            "Currencies: {} (every {})",
            currencies,
            feed.spec.cadence
        );
    }
}
