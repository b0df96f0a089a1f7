//! Validated configuration, as the rest of the server consumes it.

use ratepub_core::entities::FeedSpec;
use ratepub_core::sources::SourceKind;
use std::time::Duration;
use url::Url;

/// Relay connection settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub url: Url,
    pub publish_timeout: Duration,
}

/// A feed and which upstream implementation serves it.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub spec: FeedSpec,
    pub source: SourceKind,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub app_name: String,
    pub relay: RelaySettings,
    /// Selected feeds, in file order.
    pub feeds: Vec<FeedSettings>,
}
