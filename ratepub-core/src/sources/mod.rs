//! Upstream rate APIs.
//!
//! Each feed is served by one [`RateSource`]. Sources only fetch and parse;
//! checking that the snapshot matches the feed is the event builder's job.

pub mod blockchain_ticker;
pub mod frankfurter;

pub use blockchain_ticker::BlockchainTickerSource;
pub use frankfurter::FrankfurterSource;

use crate::entities::{FeedSpec, RateSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while fetching a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or transport failure
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not what the source expects
    #[error("response parsing error: {0}")]
    Parse(String),
}

/// Trait for upstream rate APIs.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the current rates for `feed`.
    async fn fetch(&self, feed: &FeedSpec) -> Result<RateSnapshot, FetchError>;

    /// Short name of the upstream, for logs.
    fn name(&self) -> &'static str;
}

/// Which upstream implementation serves a feed. Used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// `api.frankfurter.app` style fiat rates
    Frankfurter,
    /// `blockchain.info/ticker` style BTC prices
    BlockchainTicker,
}

impl SourceKind {
    /// Instantiate the source, sharing `http_client` between feeds.
    pub fn build(self, http_client: reqwest::Client) -> Box<dyn RateSource> {
        match self {
            SourceKind::Frankfurter => Box::new(FrankfurterSource::new(http_client)),
            SourceKind::BlockchainTicker => Box::new(BlockchainTickerSource::new(http_client)),
        }
    }
}

/// Reject non-2xx responses, keeping the body for the error message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        status: status.as_u16(),
        body,
    })
}
