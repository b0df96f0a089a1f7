//! TOML file configuration structures.
//!
//! These structs directly map to the `ratepub.toml` file format. Every
//! field has a default, so an empty or missing file is a valid
//! configuration.

use ratepub_core::sources::SourceKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_NAME: &str = "app";
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8080";
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 10_000;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Prefix for the default `d` tags and topics.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub relay: RelayConfig,
    /// Empty means the built-in fiat and bitcoin feeds.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            relay: RelayConfig::default(),
            feeds: Vec::new(),
        }
    }
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

/// Relay configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// WebSocket URL of the relay (`ws://` or `wss://`).
    #[serde(default = "default_relay_url")]
    pub url: String,
    /// How long to wait for the relay's `OK` before giving up on a publish.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
        }
    }
}

fn default_relay_url() -> String {
    DEFAULT_RELAY_URL.to_string()
}

fn default_publish_timeout_ms() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_MS
}

/// One `[[feeds]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub source: SourceKind,
    pub api_url: String,
    pub base_currency: String,
    pub quote_currencies: Vec<String>,
    pub cadence_minutes: u32,
    /// Defaults to `{app_name}-{name}-rates`.
    #[serde(default)]
    pub replaceable_tag: Option<String>,
    /// Defaults to `[app_name, "{name}-rates"]`.
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

impl FeedConfig {
    pub fn replaceable_tag_for(&self, app_name: &str) -> String {
        self.replaceable_tag
            .clone()
            .unwrap_or_else(|| format!("{app_name}-{}-rates", self.name))
    }

    pub fn topics_for(&self, app_name: &str) -> Vec<String> {
        self.topics
            .clone()
            .unwrap_or_else(|| vec![app_name.to_string(), format!("{}-rates", self.name)])
    }
}

/// The two feeds published when the file names none.
pub fn default_feeds(app_name: &str) -> Vec<FeedConfig> {
    vec![
        FeedConfig {
            name: "fiat".to_string(),
            source: SourceKind::Frankfurter,
            api_url: "https://api.frankfurter.app/latest".to_string(),
            base_currency: "USD".to_string(),
            quote_currencies: ["EUR", "CAD", "GBP", "JPY", "CNY", "MXN"]
                .into_iter()
                .map(String::from)
                .collect(),
            cadence_minutes: 15,
            replaceable_tag: Some(format!("{app_name}-currency-rates")),
            topics: Some(vec![app_name.to_string(), "currency-rates".to_string()]),
        },
        FeedConfig {
            name: "bitcoin".to_string(),
            source: SourceKind::BlockchainTicker,
            api_url: "https://blockchain.info/ticker".to_string(),
            base_currency: "BTC".to_string(),
            quote_currencies: vec!["USD".to_string()],
            cadence_minutes: 60,
            replaceable_tag: Some(format!("{app_name}-bitcoin-rates")),
            topics: Some(vec![app_name.to_string(), "bitcoin-rates".to_string()]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
app_name = "splitstr"

[relay]
url = "wss://relay.example.com"
publish_timeout_ms = 5000

[[feeds]]
name = "fiat"
source = "frankfurter"
api_url = "https://api.frankfurter.app/latest"
base_currency = "USD"
quote_currencies = ["EUR", "GBP"]
cadence_minutes = 15

[[feeds]]
name = "bitcoin"
source = "blockchain-ticker"
api_url = "https://blockchain.info/ticker"
base_currency = "BTC"
quote_currencies = ["USD"]
cadence_minutes = 60
replaceable_tag = "splitstr-bitcoin-rates"
topics = ["splitstr", "bitcoin-rates"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app_name, "splitstr");
        assert_eq!(config.relay.url, "wss://relay.example.com");
        assert_eq!(config.relay.publish_timeout_ms, 5000);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].source, SourceKind::Frankfurter);
        assert_eq!(config.feeds[1].source, SourceKind::BlockchainTicker);
        assert_eq!(
            config.feeds[0].replaceable_tag_for(&config.app_name),
            "splitstr-fiat-rates"
        );
        assert_eq!(
            config.feeds[0].topics_for(&config.app_name),
            ["splitstr", "fiat-rates"]
        );
        assert_eq!(
            config.feeds[1].replaceable_tag_for(&config.app_name),
            "splitstr-bitcoin-rates"
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert_eq!(config.relay.url, DEFAULT_RELAY_URL);
        assert_eq!(config.relay.publish_timeout_ms, 10_000);
        assert!(config.feeds.is_empty());
    }

    #[test]
    fn test_default_feeds() {
        let feeds = default_feeds("app");
        assert_eq!(feeds[0].name, "fiat");
        assert_eq!(feeds[0].cadence_minutes, 15);
        assert_eq!(feeds[0].replaceable_tag_for("app"), "app-currency-rates");
        assert_eq!(feeds[0].topics_for("app"), ["app", "currency-rates"]);
        assert_eq!(feeds[1].name, "bitcoin");
        assert_eq!(feeds[1].cadence_minutes, 60);
        assert_eq!(feeds[1].replaceable_tag_for("app"), "app-bitcoin-rates");
        assert_eq!(feeds[1].quote_currencies, ["USD"]);
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        let toml_str = r#"
[[feeds]]
name = "x"
source = "coingecko"
api_url = "https://example.com"
base_currency = "USD"
quote_currencies = ["EUR"]
cadence_minutes = 15
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
