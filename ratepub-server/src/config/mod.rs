//! Configuration module for ratepub-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables, and reading the signing key.

pub mod file;
pub mod runtime;

use crate::config::file::{FeedConfig, FileConfig, RelayConfig, default_feeds};
use crate::config::runtime::{FeedSettings, LoadedConfig, RelaySettings};
use ratepub_core::entities::{Cadence, CurrencyCode, FeedSpec, FeedSpecError};
use ratepub_sdk::signature::{Keys, SignatureError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const PRIVATE_KEY_ENV: &str = "NOSTR_PRIVATE_KEY";

/// Value shipped in `.env.example`; never a real key.
pub const PRIVATE_KEY_PLACEHOLDER: &str = "YOUR_PRIVATE_KEY_HEX";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid {field} url {value:?}: {source}")]
    UrlError {
        field: String,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid feed: {0}")]
    FeedError(#[from] FeedSpecError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("NOSTR_PRIVATE_KEY environment variable not set")]
    MissingPrivateKey,

    #[error("NOSTR_PRIVATE_KEY still holds the placeholder value")]
    PlaceholderPrivateKey,

    #[error("NOSTR_PRIVATE_KEY is not a valid secret key: {0}")]
    InvalidPrivateKey(#[source] SignatureError),
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    app_name_override: Option<String>,
    relay_url_override: Option<String>,
    feed_filter: Vec<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            app_name_override: None,
            relay_url_override: None,
            feed_filter: Vec::new(),
        }
    }

    pub fn with_app_name(mut self, app_name: Option<String>) -> Self {
        self.app_name_override = app_name;
        self
    }

    pub fn with_relay_url(mut self, relay_url: Option<String>) -> Self {
        self.relay_url_override = relay_url;
        self
    }

    /// Only load the named feeds. Empty means all of them.
    pub fn with_feed_filter(mut self, names: Vec<String>) -> Self {
        self.feed_filter = names;
        self
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file, if there is one
    /// 2. Apply CLI and environment overrides
    /// 3. Fill in the built-in feeds when none are configured
    /// 4. Validate everything and apply the feed filter
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = self.read_file()?;

        if let Some(app_name) = &self.app_name_override {
            file_config.app_name = app_name.clone();
        }
        if let Some(url) = &self.relay_url_override {
            file_config.relay.url = url.clone();
        }

        resolve(file_config, &self.feed_filter)
    }

    fn read_file(&self) -> Result<FileConfig, ConfigError> {
        match std::fs::read_to_string(&self.config_path) {
            Ok(content) => {
                tracing::info!("Configuration loaded from {:?}", self.config_path);
                Ok(toml::from_str(&content)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No config file at {:?}, using built-in defaults",
                    self.config_path
                );
                Ok(FileConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Turn a parsed file into validated settings, keeping only the feeds named
/// in `feed_filter` (all of them when it is empty).
fn resolve(mut file_config: FileConfig, feed_filter: &[String]) -> Result<LoadedConfig, ConfigError> {
    if file_config.app_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "app_name must not be empty".to_string(),
        ));
    }
    if file_config.feeds.is_empty() {
        file_config.feeds = default_feeds(&file_config.app_name);
    }

    let relay = build_relay(&file_config.relay)?;

    let mut feeds = Vec::with_capacity(file_config.feeds.len());
    for feed in &file_config.feeds {
        if feeds
            .iter()
            .any(|f: &FeedSettings| f.spec.name == feed.name)
        {
            return Err(ConfigError::ValidationError(format!(
                "feed name {} is used more than once",
                feed.name
            )));
        }
        feeds.push(build_feed(feed, &file_config.app_name)?);
    }

    if let Some(unknown) = feed_filter
        .iter()
        .find(|name| !feeds.iter().any(|f| &f.spec.name == *name))
    {
        return Err(ConfigError::ValidationError(format!(
            "unknown feed {unknown}"
        )));
    }
    if !feed_filter.is_empty() {
        feeds.retain(|f| feed_filter.contains(&f.spec.name));
    }

    Ok(LoadedConfig {
        app_name: file_config.app_name,
        relay,
        feeds,
    })
}

fn build_relay(relay: &RelayConfig) -> Result<RelaySettings, ConfigError> {
    let url = parse_url("relay", &relay.url)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ConfigError::ValidationError(format!(
            "relay url must use ws or wss, got {}",
            url.scheme()
        )));
    }
    if relay.publish_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "relay.publish_timeout_ms must be greater than zero".to_string(),
        ));
    }
    Ok(RelaySettings {
        url,
        publish_timeout: Duration::from_millis(relay.publish_timeout_ms),
    })
}

fn build_feed(feed: &FeedConfig, app_name: &str) -> Result<FeedSettings, ConfigError> {
    let spec = FeedSpec {
        name: feed.name.clone(),
        base_currency: CurrencyCode::from(feed.base_currency.trim()),
        quote_currencies: feed
            .quote_currencies
            .iter()
            .map(|code| CurrencyCode::from(code.trim()))
            .collect(),
        api_url: parse_url(&format!("feeds.{}.api_url", feed.name), &feed.api_url)?,
        cadence: Cadence::from_minutes(feed.cadence_minutes)?,
        replaceable_tag: feed.replaceable_tag_for(app_name),
        topics: feed.topics_for(app_name),
    };
    spec.validate()?;
    Ok(FeedSettings {
        spec,
        source: feed.source,
    })
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::UrlError {
        field: field.to_string(),
        value: value.to_string(),
        source,
    })
}

/// Read the signing key from the environment.
pub fn load_signing_keys() -> Result<Keys, ConfigError> {
    let raw = std::env::var(PRIVATE_KEY_ENV).map_err(|_| ConfigError::MissingPrivateKey)?;
    parse_signing_keys(&raw)
}

fn parse_signing_keys(raw: &str) -> Result<Keys, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingPrivateKey);
    }
    if trimmed == PRIVATE_KEY_PLACEHOLDER {
        return Err(ConfigError::PlaceholderPrivateKey);
    }
    Keys::from_hex(trimmed).map_err(ConfigError::InvalidPrivateKey)
}
